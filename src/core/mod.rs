//! Core model of the state machine.
//!
//! This module contains the plain data the runtime operates on:
//! - State identifiers and the name/index table
//! - Events, payloads and handler outcomes
//! - The transition whitelist
//! - Bounded transition history
//!
//! Nothing here schedules work or invokes host code.

mod event;
mod history;
mod state;
mod whitelist;

pub use event::{Event, EventId, Outcome, TIMEOUT_EVENT};
pub use history::{StateHistory, TransitionRecord, DEFAULT_HISTORY_LIMIT};
pub use state::{StateId, StateRef, StateTable};
pub use whitelist::{TransitionRule, Whitelist};
