//! Handler keys and their conventional names.

use crate::core::EventId;
use std::fmt;
use std::str::FromStr;

use super::error::BuildError;

/// Slot a handler is bound to.
///
/// `None` on either side is the wildcard. At least one side is always set.
///
/// The conventional names are `__S__E` for a state/event pair, `__S__` for
/// every event in state `S` and `____E` for event `E` in every state. The
/// heartbeat event is spelled `null`.
///
/// # Example
///
/// ```rust
/// use heartwood::builder::HandlerKey;
/// use heartwood::core::EventId;
///
/// let key: HandlerKey = "__IDLE__start".parse().unwrap();
/// assert_eq!(key, HandlerKey::state_event("IDLE", "start"));
///
/// let tick: HandlerKey = "____null".parse().unwrap();
/// assert_eq!(tick.event_id(), Some(&EventId::Heartbeat));
/// assert_eq!(tick.to_string(), "____null");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    state: Option<String>,
    event: Option<EventId>,
}

impl HandlerKey {
    pub fn state_event(state: impl Into<String>, event: impl Into<EventId>) -> Self {
        Self {
            state: Some(state.into()),
            event: Some(event.into()),
        }
    }

    /// Every event in `state`.
    pub fn state(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            event: None,
        }
    }

    /// `event` in every state.
    pub fn event(event: impl Into<EventId>) -> Self {
        Self {
            state: None,
            event: Some(event.into()),
        }
    }

    pub fn state_name(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn event_id(&self) -> Option<&EventId> {
        self.event.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Option<String>, Option<EventId>) {
        (self.state, self.event)
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("__")?;
        if let Some(state) = &self.state {
            f.write_str(state)?;
        }
        f.write_str("__")?;
        if let Some(event) = &self.event {
            write!(f, "{}", event)?;
        }
        Ok(())
    }
}

impl FromStr for HandlerKey {
    type Err = BuildError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let invalid = || BuildError::InvalidHandlerName(name.to_string());

        let rest = name.strip_prefix("__").ok_or_else(invalid)?;
        let (state, event) = rest.split_once("__").ok_or_else(invalid)?;

        let state = (!state.is_empty()).then(|| state.to_string());
        let event = match event {
            "" => None,
            "null" => Some(EventId::Heartbeat),
            other => Some(EventId::from(other)),
        };

        if state.is_none() && event.is_none() {
            return Err(invalid());
        }
        Ok(Self { state, event })
    }
}
