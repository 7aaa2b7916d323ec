//! Construction options for a state machine.
//!
//! Every field is optional when deserializing; missing fields take their
//! defaults.
//!
//! # Example
//!
//! ```rust
//! use heartwood::config::MachineConfig;
//! use heartwood::runtime::Heartbeat;
//! use std::time::Duration;
//!
//! let config = MachineConfig::from_json(
//!     r#"{
//!         "states": ["IDLE", "RUNNING", "DONE"],
//!         "init_state": "IDLE",
//!         "transition_whitelist": [[["IDLE"], ["RUNNING"]], [["RUNNING"], ["DONE", 0]]],
//!         "heartbeat": 100
//!     }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.heartbeat, Heartbeat::Every(Duration::from_millis(100)));
//! assert!(!config.cascade_handlers);
//! assert!(config.validate().is_success());
//! ```

pub mod validation;

use crate::core::{StateRef, DEFAULT_HISTORY_LIMIT};
use crate::runtime::Heartbeat;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

pub use validation::ConfigViolation;

/// Interval used for `heartbeat: true` unless configured otherwise.
pub const DEFAULT_HEARTBEAT_MS: u64 = 1000;

/// One whitelist rule: `(sources, destinations)`, a two-element array in JSON.
pub type RuleConfig = (Vec<StateRef>, Vec<StateRef>);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Diagnostic label; generated when absent.
    pub id: Option<String>,

    /// Ordered, distinct state names.
    pub states: Vec<String>,

    /// Initial state; the first declared state when absent.
    pub init_state: Option<StateRef>,

    /// Allowed transitions; every transition is allowed when absent.
    pub transition_whitelist: Option<Vec<RuleConfig>>,

    /// Try less specific handlers when a handler does not handle an event.
    pub cascade_handlers: bool,

    pub heartbeat: Heartbeat,

    /// Interval substituted for `heartbeat: true`.
    pub default_heartbeat_ms: u64,

    /// Number of transitions kept in the history.
    pub history_limit: usize,

    /// Trace every internal operation at `debug` level.
    pub debug: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            id: None,
            states: Vec::new(),
            init_state: None,
            transition_whitelist: None,
            cascade_handlers: false,
            heartbeat: Heartbeat::Disabled,
            default_heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            debug: false,
        }
    }
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn default_heartbeat(&self) -> Duration {
        Duration::from_millis(self.default_heartbeat_ms)
    }

    /// Check the whole configuration, collecting every violation.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<ConfigViolation>> {
        validation::validate(self)
    }
}
