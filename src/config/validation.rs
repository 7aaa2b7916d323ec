//! Whole-configuration validation.
//!
//! Uses stillwater's `Validation` so that a bad configuration reports every
//! problem at once instead of the first one found.

use super::MachineConfig;
use crate::core::StateRef;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// One problem found in a configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigViolation {
    #[error("No states declared")]
    NoStates,

    #[error("State '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("Initial state {0} is not declared")]
    UnknownInitialState(String),

    #[error("Transition whitelist rule {rule} references unknown state {state}")]
    UnknownWhitelistState { rule: usize, state: String },

    #[error("Default heartbeat interval must be at least 1ms")]
    ZeroDefaultHeartbeat,
}

type Check = Validation<(), NonEmptyVec<ConfigViolation>>;

fn check(ok: bool, violation: impl FnOnce() -> ConfigViolation) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

/// Validate `config`, accumulating ALL violations.
pub fn validate(config: &MachineConfig) -> Check {
    let mut checks: Vec<Check> = Vec::new();

    checks.push(check(!config.states.is_empty(), || ConfigViolation::NoStates));

    let mut declared = HashSet::with_capacity(config.states.len());
    let mut reported = HashSet::new();
    for name in &config.states {
        if !declared.insert(name.as_str()) && reported.insert(name.as_str()) {
            checks.push(Validation::fail(ConfigViolation::DuplicateState(
                name.clone(),
            )));
        }
    }

    let is_declared = |state: &StateRef| match state {
        StateRef::Index(i) => *i < config.states.len(),
        StateRef::Name(name) => declared.contains(name.as_str()),
    };

    if let Some(init) = &config.init_state {
        checks.push(check(is_declared(init), || {
            ConfigViolation::UnknownInitialState(init.to_string())
        }));
    }

    for (rule, (from, to)) in config.transition_whitelist.iter().flatten().enumerate() {
        for state in from.iter().chain(to) {
            checks.push(check(is_declared(state), || {
                ConfigViolation::UnknownWhitelistState {
                    rule,
                    state: state.to_string(),
                }
            }));
        }
    }

    if config.heartbeat == crate::runtime::Heartbeat::Default {
        checks.push(check(config.default_heartbeat_ms > 0, || {
            ConfigViolation::ZeroDefaultHeartbeat
        }));
    }

    Validation::all_vec(checks).map(|_| ())
}
