//! Handler table and specificity resolution.
//!
//! For a state `S` and event `E`, candidates are tried in this order:
//! 1. the handler bound to `S` and `E` (`__S__E`),
//! 2. the handler bound to `S` for every event (`__S__`),
//! 3. the handler bound to `E` in every state (`____E`).

use crate::core::{Event, EventId, Outcome, StateId};
use std::collections::HashMap;
use std::sync::Arc;

use super::error::HandlerError;
use super::machine::StateMachine;

/// Host-supplied behavior bound to a specificity tier.
pub type HandlerFn<C> =
    Arc<dyn Fn(&mut StateMachine<C>, &Event) -> Result<Outcome, HandlerError> + Send + Sync>;

/// Specificity tier of a resolved handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    StateEvent,
    State,
    Event,
}

impl Tier {
    pub const ORDER: [Tier; 3] = [Tier::StateEvent, Tier::State, Tier::Event];
}

pub(crate) struct HandlerTable<C: 'static> {
    state_event: HashMap<StateId, HashMap<EventId, HandlerFn<C>>>,
    state: HashMap<StateId, HandlerFn<C>>,
    event: HashMap<EventId, HandlerFn<C>>,
}

impl<C: 'static> Default for HandlerTable<C> {
    fn default() -> Self {
        Self {
            state_event: HashMap::new(),
            state: HashMap::new(),
            event: HashMap::new(),
        }
    }
}

impl<C: 'static> HandlerTable<C> {
    /// Bind a handler. `None` on either side is the wildcard. Returns the
    /// handler previously bound to the same slot.
    pub fn insert(
        &mut self,
        state: Option<StateId>,
        event: Option<EventId>,
        handler: HandlerFn<C>,
    ) -> Option<HandlerFn<C>> {
        match (state, event) {
            (Some(state), Some(event)) => self
                .state_event
                .entry(state)
                .or_default()
                .insert(event, handler),
            (Some(state), None) => self.state.insert(state, handler),
            (None, Some(event)) => self.event.insert(event, handler),
            (None, None) => None,
        }
    }

    pub fn get(&self, state: Option<StateId>, event: Option<&EventId>) -> Option<&HandlerFn<C>> {
        match (state, event) {
            (Some(state), Some(event)) => self.state_event.get(&state)?.get(event),
            (Some(state), None) => self.state.get(&state),
            (None, Some(event)) => self.event.get(event),
            (None, None) => None,
        }
    }

    /// Candidates for `event` in `state`, most specific first. Missing tiers
    /// are `None`.
    pub fn candidates(&self, state: StateId, event: &EventId) -> [Option<HandlerFn<C>>; 3] {
        Tier::ORDER.map(|tier| {
            let slot = match tier {
                Tier::StateEvent => self.get(Some(state), Some(event)),
                Tier::State => self.get(Some(state), None),
                Tier::Event => self.get(None, Some(event)),
            };
            slot.cloned()
        })
    }

    pub fn len(&self) -> usize {
        self.state_event.values().map(HashMap::len).sum::<usize>()
            + self.state.len()
            + self.event.len()
    }
}

/// Handler that accepts any event.
pub fn pass<C: 'static>(
    _machine: &mut StateMachine<C>,
    _event: &Event,
) -> Result<Outcome, HandlerError> {
    Ok(Outcome::Handled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn returning(outcome: Outcome) -> HandlerFn<()> {
        Arc::new(move |_, _| Ok(outcome.clone()))
    }

    fn outcome_of(handler: &Option<HandlerFn<()>>) -> Option<Outcome> {
        let mut machine = crate::StateMachineBuilder::<()>::new()
            .states(["S"])
            .build()
            .unwrap();
        handler
            .as_ref()
            .map(|h| h(&mut machine, &Event::new("e")).unwrap())
    }

    #[test]
    fn candidates_follow_specificity() {
        let mut table = HandlerTable::default();
        let state = StateId(0);
        let event = EventId::from("go");

        table.insert(Some(state), Some(event.clone()), returning(Outcome::Handled));
        table.insert(Some(state), None, returning(Outcome::Retry));
        table.insert(None, Some(event.clone()), returning(Outcome::Unhandled));

        let [first, second, third] = table.candidates(state, &event);
        assert_eq!(outcome_of(&first), Some(Outcome::Handled));
        assert_eq!(outcome_of(&second), Some(Outcome::Retry));
        assert_eq!(outcome_of(&third), Some(Outcome::Unhandled));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn missing_tiers_are_none() {
        let mut table = HandlerTable::default();
        table.insert(None, Some(EventId::Heartbeat), returning(Outcome::Handled));

        let [first, second, third] = table.candidates(StateId(1), &EventId::Heartbeat);
        assert!(first.is_none());
        assert!(second.is_none());
        assert!(third.is_some());

        let [.., other] = table.candidates(StateId(1), &EventId::from("go"));
        assert!(other.is_none());
    }

    #[test]
    fn insert_replaces_existing_slot() {
        let mut table = HandlerTable::default();
        assert!(table
            .insert(Some(StateId(0)), None, returning(Outcome::Handled))
            .is_none());
        assert!(table
            .insert(Some(StateId(0)), None, returning(Outcome::Retry))
            .is_some());
        assert_eq!(table.len(), 1);
    }
}
