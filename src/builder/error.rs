//! Errors raised while building a state machine.

use crate::config::ConfigViolation;
use crate::runtime::MachineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid configuration: {}", format_violations(.0))]
    InvalidConfig(Vec<ConfigViolation>),

    #[error("Configuration could not be parsed: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("'{0}' is not a handler name. Expected __STATE__EVENT, __STATE__ or ____EVENT")]
    InvalidHandlerName(String),

    #[error("Handler {handler} names undeclared state '{state}'")]
    UnknownHandlerState { handler: String, state: String },

    #[error("More than one handler registered for {0}")]
    DuplicateHandler(String),

    #[error("Handler alias {0} refers back to itself")]
    AliasCycle(String),

    #[error("Handler alias {alias} targets {target}, which has no handler")]
    UnknownAliasTarget { alias: String, target: String },
}

fn format_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_lists_every_violation() {
        let error = BuildError::InvalidConfig(vec![
            ConfigViolation::NoStates,
            ConfigViolation::ZeroDefaultHeartbeat,
        ]);

        assert_eq!(
            error.to_string(),
            "Invalid configuration: No states declared; \
             Default heartbeat interval must be at least 1ms"
        );
    }
}
