//! Runtime errors: the fatal panic tier and what handlers may return.

use thiserror::Error;

/// Message used when a panic is raised without one.
pub const DEFAULT_PANIC_MESSAGE: &str = "state machine exception";

/// Why a machine entered the panic state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Fault {
    #[error("{}", .0.as_deref().unwrap_or(DEFAULT_PANIC_MESSAGE))]
    Explicit(Option<String>),

    /// An event or transition reached a machine that had already panicked.
    #[error("state machine exception")]
    Relapse,

    #[error("Unhandled condition for state {state} with event {event}")]
    Unhandled { state: String, event: String },

    #[error("Forbidden transition from {from} to {to}")]
    ForbiddenTransition { from: String, to: String },

    #[error("Unknown state {0}")]
    UnknownState(String),

    #[error("Unhandled exception in state {state} handling event {event}: {reason}")]
    HandlerFailed {
        state: String,
        event: String,
        reason: String,
    },
}

/// Errors returned by machine operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MachineError {
    /// A state reference could not be resolved. Not fatal on its own.
    #[error("Unknown state {0}")]
    UnknownState(String),

    /// The machine panicked and is now in the undefined state.
    #[error("{0}")]
    Panic(Fault),
}

impl MachineError {
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Panic(fault) => Some(fault),
            Self::UnknownState(_) => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}

/// Errors a handler may return. Every one of them panics the machine.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
