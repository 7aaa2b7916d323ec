//! Events and the values handlers return after processing one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Event name used by [`StateMachine::timeout`](crate::StateMachine::timeout).
///
/// A plain name with no `$` prefix, dispatched through the same handler
/// tiers as any other named event.
pub const TIMEOUT_EVENT: &str = "timeout";

/// Identifier of an event.
///
/// `Heartbeat` is the null event injected by the heartbeat timer. In
/// conventional handler names it is spelled `null`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventId {
    Heartbeat,
    Named(String),
}

impl EventId {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Heartbeat => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heartbeat => f.write_str("null"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for EventId {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for EventId {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// A queued stimulus: an identifier plus an arbitrary payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub payload: Value,
}

impl Event {
    /// Named event without payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EventId::Named(name.into()),
            payload: Value::Null,
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            id: EventId::Named(name.into()),
            payload: payload.into(),
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            id: EventId::Heartbeat,
            payload: Value::Null,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.id.name()
    }

    pub fn is_heartbeat(&self) -> bool {
        self.id == EventId::Heartbeat
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl<P: Into<Value>> From<(&str, P)> for Event {
    fn from((name, payload): (&str, P)) -> Self {
        Self::with_payload(name, payload)
    }
}

/// What a handler reports back to the dispatch loop.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The event was fully handled.
    Handled,

    /// Zero-transition: run the same event again before anything else queued.
    Retry,

    /// Zero-transition with a replacement event, run before anything else queued.
    Emit(Event),

    /// The handler did not handle the event. Fatal unless a less specific
    /// handler is tried next.
    Unhandled,
}

impl Outcome {
    pub fn emit(name: impl Into<String>) -> Self {
        Self::Emit(Event::new(name))
    }

    pub fn emit_with(name: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self::Emit(Event::with_payload(name, payload))
    }
}

impl From<bool> for Outcome {
    fn from(handled: bool) -> Self {
        if handled {
            Self::Handled
        } else {
            Self::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeout_event_is_a_plain_name() {
        let event = Event::new(TIMEOUT_EVENT);
        assert_eq!(event.name(), Some("timeout"));
        assert_eq!(event.id.to_string(), "timeout");
    }

    #[test]
    fn heartbeat_has_no_name() {
        let beat = Event::heartbeat();
        assert!(beat.is_heartbeat());
        assert_eq!(beat.name(), None);
        assert_eq!(beat.id.to_string(), "null");
    }

    #[test]
    fn tuple_converts_into_event_with_payload() {
        let event: Event = ("progress", json!({ "done": 3 })).into();
        assert_eq!(event.name(), Some("progress"));
        assert_eq!(event.payload["done"], 3);
    }

    #[test]
    fn plain_name_has_null_payload() {
        let event = Event::from("start");
        assert_eq!(event.payload, Value::Null);
        assert!(!event.is_heartbeat());
    }

    #[test]
    fn boolean_outcomes_follow_handler_contract() {
        assert_eq!(Outcome::from(true), Outcome::Handled);
        assert_eq!(Outcome::from(false), Outcome::Retry);
    }

    #[test]
    fn emit_builds_replacement_events() {
        assert_eq!(Outcome::emit("next"), Outcome::Emit(Event::new("next")));
        assert_eq!(
            Outcome::emit_with("next", 5),
            Outcome::Emit(Event::with_payload("next", 5))
        );
    }
}
