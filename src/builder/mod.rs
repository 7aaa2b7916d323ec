//! Builder API for state machine construction.
//!
//! [`StateMachineBuilder`] collects options, handlers and aliases and checks
//! them all at once when the machine is built. The [`state_enum!`] macro
//! lets typed hosts name states without spelling strings.
//!
//! [`state_enum!`]: crate::state_enum

pub mod error;
pub mod handler;
pub mod machine;
pub mod macros;

pub use error::BuildError;
pub use handler::HandlerKey;
pub use machine::StateMachineBuilder;
