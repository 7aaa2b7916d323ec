//! Deferred work owned by a machine.
//!
//! Nothing the machine schedules runs inside the call that scheduled it.
//! Work goes into a FIFO of ready tasks, or into a deadline-ordered timer set
//! that feeds the ready queue once the clock passes each deadline. The host
//! pulls tasks out one at a time through the machine's `run_*` methods.

use crate::core::{Event, StateId};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::Clock;
use super::listeners::{ListenerFn, ListenerId};

/// Key of a pending timer: deadline, then insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerKey(Instant, u64);

impl TimerKey {
    pub fn deadline(self) -> Instant {
        self.0
    }
}

pub(crate) enum TimerAction {
    Heartbeat,
    Fire(TimeoutHandle),
}

impl TimerAction {
    /// Cancelled timeouts stay armed until purged but never fire.
    fn is_live(&self) -> bool {
        match self {
            Self::Heartbeat => true,
            Self::Fire(handle) => !handle.is_cancelled(),
        }
    }
}

pub(crate) enum Task<C: 'static> {
    /// Pop one event off the queue and dispatch it.
    Drain,
    /// Heartbeat timer fell due.
    Heartbeat(TimerKey),
    /// Scheduled event fell due.
    Fire(TimeoutHandle),
    /// Run a state-change listener.
    Notify {
        listener: ListenerId,
        callback: ListenerFn<C>,
        from: StateId,
        to: StateId,
    },
}

pub(crate) struct Scheduler<C: 'static> {
    clock: Arc<dyn Clock>,
    ready: VecDeque<Task<C>>,
    timers: BTreeMap<TimerKey, TimerAction>,
    sequence: u64,
}

impl<C: 'static> Scheduler<C> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ready: VecDeque::new(),
            timers: BTreeMap::new(),
            sequence: 0,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn defer(&mut self, task: Task<C>) {
        self.ready.push_back(task);
    }

    /// Arm a timer. Returns `None` when the deadline is past the range of
    /// `Instant`; such a timer would never fire and is not kept.
    pub fn start_timer(&mut self, delay: Duration, action: TimerAction) -> Option<TimerKey> {
        let deadline = self.clock.now().checked_add(delay)?;
        self.timers.retain(|_, armed| armed.is_live());
        let key = TimerKey(deadline, self.sequence);
        self.sequence += 1;
        self.timers.insert(key, action);
        Some(key)
    }

    pub fn cancel_timer(&mut self, key: TimerKey) -> bool {
        self.timers.remove(&key).is_some()
    }

    /// Move every timer whose deadline has passed onto the ready queue, in
    /// deadline order.
    pub fn promote_due(&mut self) {
        let now = self.clock.now();
        while let Some(entry) = self.timers.first_entry() {
            if entry.key().deadline() > now {
                break;
            }
            let (key, action) = entry.remove_entry();
            let task = match action {
                TimerAction::Heartbeat => Task::Heartbeat(key),
                TimerAction::Fire(handle) => Task::Fire(handle),
            };
            self.ready.push_back(task);
        }
    }

    pub fn pop(&mut self) -> Option<Task<C>> {
        self.ready.pop_front()
    }

    /// Deadline of the earliest timer that can still fire.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers
            .iter()
            .find(|(_, action)| action.is_live())
            .map(|(key, _)| key.deadline())
    }

    pub fn pending(&self) -> usize {
        self.ready.len()
    }

    pub fn timers(&self) -> usize {
        self.timers.values().filter(|action| action.is_live()).count()
    }
}

#[derive(Debug)]
struct TimeoutState {
    event: Event,
    delay: Duration,
    settled: AtomicBool,
    cancelled: AtomicBool,
}

/// Cancellation handle for an event scheduled with
/// [`StateMachine::schedule`](crate::StateMachine::schedule).
///
/// Clones refer to the same scheduled event.
///
/// # Example
///
/// ```rust
/// use heartwood::runtime::ManualClock;
/// use heartwood::{StateMachine, StateMachineBuilder};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let mut machine: StateMachine = StateMachineBuilder::new()
///     .states(["IDLE"])
///     .clock(clock.clone())
///     .build()
///     .unwrap();
///
/// let handle = machine.schedule(Duration::from_millis(50), "wake");
/// assert!(handle.cancel());
/// assert!(!handle.cancel());
///
/// machine.run_for(Duration::from_millis(100)).unwrap();
/// assert_eq!(machine.queued_events().count(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct TimeoutHandle {
    state: Arc<TimeoutState>,
}

impl TimeoutHandle {
    pub(crate) fn new(event: Event, delay: Duration) -> Self {
        Self {
            state: Arc::new(TimeoutState {
                event,
                delay,
                settled: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Prevent the event from ever being pushed.
    ///
    /// Returns `true` if this call cancelled it, `false` if it had already
    /// fired or been cancelled.
    pub fn cancel(&self) -> bool {
        if self.state.settled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.state.cancelled.store(true, Ordering::SeqCst);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the event was pushed.
    pub fn has_fired(&self) -> bool {
        self.state.settled.load(Ordering::SeqCst) && !self.is_cancelled()
    }

    pub fn event(&self) -> &Event {
        &self.state.event
    }

    pub fn payload(&self) -> &Value {
        &self.state.event.payload
    }

    pub fn delay(&self) -> Duration {
        self.state.delay
    }

    /// Claim the event for pushing. Only the first of `cancel` and `claim`
    /// wins.
    pub(crate) fn claim(&self) -> bool {
        !self.state.settled.swap(true, Ordering::SeqCst)
    }
}
