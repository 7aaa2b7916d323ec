//! State-change listener registry.
//!
//! Listeners are kept in a dense slot vector; freed slots are reused by the
//! next registration. Two per-direction indices map a state to the handles
//! bound to entering or leaving it, so a transition only touches the
//! listeners that can match.

use crate::core::StateId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::machine::StateMachine;

/// Callback fired after a transition, with the machine, the previous state
/// and the new state.
pub type ListenerFn<C> = Arc<dyn Fn(&mut StateMachine<C>, StateId, StateId) + Send + Sync>;

/// Handle returned by listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub usize);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of a transition a listener watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Fires when the new state is in the bound set.
    Enter,
    /// Fires when the previous state is in the bound set.
    Leave,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => f.write_str("up"),
            Self::Leave => f.write_str("down"),
        }
    }
}

struct Listener<C: 'static> {
    callback: ListenerFn<C>,
    once: bool,
    triggered: usize,
    states: Vec<StateId>,
    direction: Direction,
}

/// What is left of a listener once it has been unregistered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedListener {
    pub id: ListenerId,
    pub states: Vec<StateId>,
    pub direction: Direction,
    pub once: bool,
    /// How many times the callback was scheduled.
    pub triggered: usize,
}

/// A callback ready to be scheduled for one transition.
pub(crate) struct Triggered<C: 'static> {
    pub id: ListenerId,
    pub callback: ListenerFn<C>,
    pub removed: Option<RemovedListener>,
}

pub(crate) struct ListenerRegistry<C: 'static> {
    slots: Vec<Option<Listener<C>>>,
    entering: HashMap<StateId, Vec<ListenerId>>,
    leaving: HashMap<StateId, Vec<ListenerId>>,
}

impl<C: 'static> Default for ListenerRegistry<C> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            entering: HashMap::new(),
            leaving: HashMap::new(),
        }
    }
}

impl<C: 'static> ListenerRegistry<C> {
    fn index_mut(&mut self, direction: Direction) -> &mut HashMap<StateId, Vec<ListenerId>> {
        match direction {
            Direction::Enter => &mut self.entering,
            Direction::Leave => &mut self.leaving,
        }
    }

    pub fn add(
        &mut self,
        states: Vec<StateId>,
        callback: ListenerFn<C>,
        once: bool,
        direction: Direction,
    ) -> ListenerId {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len());
        let id = ListenerId(slot);

        let index = self.index_mut(direction);
        for state in &states {
            index.entry(*state).or_default().push(id);
        }

        let listener = Listener {
            callback,
            once,
            triggered: 0,
            states,
            direction,
        };
        if slot == self.slots.len() {
            self.slots.push(Some(listener));
        } else {
            self.slots[slot] = Some(listener);
        }

        id
    }

    pub fn remove(&mut self, id: ListenerId) -> Option<RemovedListener> {
        let listener = self.slots.get_mut(id.0)?.take()?;

        let index = self.index_mut(listener.direction);
        for state in &listener.states {
            if let Some(handles) = index.get_mut(state) {
                if let Some(pos) = handles.iter().position(|h| *h == id) {
                    handles.remove(pos);
                }
                if handles.is_empty() {
                    index.remove(state);
                }
            }
        }

        Some(RemovedListener {
            id,
            states: listener.states,
            direction: listener.direction,
            once: listener.once,
            triggered: listener.triggered,
        })
    }

    /// Collect the callbacks a `prev -> next` transition fires.
    ///
    /// Leave listeners of `prev` come first, then enter listeners of `next`.
    /// One-shot listeners are unregistered as soon as they are collected, so
    /// a later transition in the same turn cannot fire them again.
    pub fn trigger(&mut self, prev: StateId, next: StateId) -> Vec<Triggered<C>> {
        let handles: Vec<ListenerId> = self
            .leaving
            .get(&prev)
            .into_iter()
            .flatten()
            .chain(self.entering.get(&next).into_iter().flatten())
            .copied()
            .collect();

        let mut fired = Vec::with_capacity(handles.len());
        for id in handles {
            let Some(Some(listener)) = self.slots.get_mut(id.0) else {
                continue;
            };
            if listener.once && listener.triggered > 0 {
                continue;
            }

            listener.triggered += 1;
            let callback = Arc::clone(&listener.callback);
            let removed = if listener.once { self.remove(id) } else { None };

            fired.push(Triggered {
                id,
                callback,
                removed,
            });
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    #[cfg(test)]
    fn indexed(&self, direction: Direction, state: StateId) -> Vec<ListenerId> {
        let index = match direction {
            Direction::Enter => &self.entering,
            Direction::Leave => &self.leaving,
        };
        index.get(&state).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: StateId = StateId(0);
    const B: StateId = StateId(1);
    const C: StateId = StateId(2);

    fn noop() -> ListenerFn<()> {
        Arc::new(|_, _, _| {})
    }

    #[test]
    fn handles_are_recycled() {
        let mut registry = ListenerRegistry::<()>::default();
        let first = registry.add(vec![A], noop(), false, Direction::Enter);
        let second = registry.add(vec![B], noop(), false, Direction::Enter);
        let third = registry.add(vec![C], noop(), false, Direction::Leave);

        assert_eq!((first, second, third), (ListenerId(0), ListenerId(1), ListenerId(2)));

        registry.remove(second);
        let fourth = registry.add(vec![A], noop(), true, Direction::Leave);

        assert_eq!(fourth, ListenerId(1));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn remove_purges_direction_index() {
        let mut registry = ListenerRegistry::<()>::default();
        let id = registry.add(vec![A, B], noop(), false, Direction::Leave);

        assert_eq!(registry.indexed(Direction::Leave, A), vec![id]);

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.states, vec![A, B]);
        assert_eq!(removed.direction, Direction::Leave);
        assert!(registry.indexed(Direction::Leave, A).is_empty());
        assert!(registry.indexed(Direction::Leave, B).is_empty());
        assert!(!registry.contains(id));
    }

    #[test]
    fn removing_unknown_handle_returns_none() {
        let mut registry = ListenerRegistry::<()>::default();
        assert!(registry.remove(ListenerId(4)).is_none());

        let id = registry.add(vec![A], noop(), false, Direction::Enter);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn trigger_orders_leave_before_enter() {
        let mut registry = ListenerRegistry::<()>::default();
        let enter_b = registry.add(vec![B], noop(), false, Direction::Enter);
        let leave_a = registry.add(vec![A], noop(), false, Direction::Leave);
        let enter_c = registry.add(vec![C], noop(), false, Direction::Enter);

        let fired: Vec<ListenerId> = registry.trigger(A, B).into_iter().map(|t| t.id).collect();

        assert_eq!(fired, vec![leave_a, enter_b]);
        assert!(registry.trigger(B, A).is_empty());
        assert_eq!(registry.trigger(A, C).len(), 2);
        assert!(registry.contains(enter_c));
    }

    #[test]
    fn once_listener_is_removed_when_triggered() {
        let mut registry = ListenerRegistry::<()>::default();
        let id = registry.add(vec![B], noop(), true, Direction::Enter);

        let fired = registry.trigger(A, B);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].removed.as_ref().map(|r| r.triggered), Some(1));
        assert!(!registry.contains(id));

        assert!(registry.trigger(A, B).is_empty());
    }

    #[test]
    fn persistent_listener_counts_triggers() {
        let mut registry = ListenerRegistry::<()>::default();
        let id = registry.add(vec![B], noop(), false, Direction::Enter);

        registry.trigger(A, B);
        registry.trigger(C, B);

        assert_eq!(registry.remove(id).map(|r| r.triggered), Some(2));
    }

    #[test]
    fn once_listener_bound_twice_fires_once() {
        let mut registry = ListenerRegistry::<()>::default();
        registry.add(vec![B, B], noop(), true, Direction::Enter);

        assert_eq!(registry.trigger(A, B).len(), 1);
    }
}
