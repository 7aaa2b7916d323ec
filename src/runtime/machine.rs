//! The state machine: event queue, dispatch loop, transitions, listeners,
//! heartbeat and the panic lifecycle.

use crate::core::{
    Event, Outcome, StateHistory, StateId, StateRef, StateTable, TransitionRecord, Whitelist,
    TIMEOUT_EVENT,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::Clock;
use super::dispatch::{HandlerTable, Tier};
use super::error::{Fault, MachineError};
use super::heartbeat::Heartbeat;
use super::listeners::{Direction, ListenerId, ListenerRegistry, RemovedListener};
use super::scheduler::{Scheduler, Task, TimeoutHandle, TimerAction, TimerKey};

/// Emit a `debug` event tagged with the machine id when verbose tracing is on.
macro_rules! verbose {
    ($machine:expr, $($arg:tt)+) => {{
        let machine = &$machine;
        if machine.debug {
            tracing::debug!(machine = %machine.id, $($arg)+);
        }
    }};
}

/// Everything the builder hands over to a new machine.
pub(crate) struct MachineParts<C: 'static> {
    pub id: String,
    pub debug: bool,
    pub states: StateTable,
    pub initial: StateId,
    pub whitelist: Option<Whitelist>,
    pub cascade: bool,
    pub handlers: HandlerTable<C>,
    pub heartbeat: Heartbeat,
    pub default_heartbeat: Duration,
    pub history_limit: usize,
    pub clock: Arc<dyn Clock>,
    pub context: C,
}

/// Event-driven finite state machine.
///
/// Events are queued with [`push`](Self::push) and processed one per
/// scheduling turn while the host drives the machine with
/// [`run_once`](Self::run_once), [`run_until_idle`](Self::run_until_idle) or
/// [`run_for`](Self::run_for). Any fatal condition moves the machine into the
/// undefined state for good; every later event re-raises the panic.
pub struct StateMachine<C: 'static = ()> {
    id: String,
    debug: bool,
    states: StateTable,
    current: Option<StateId>,
    fault: Option<Fault>,
    whitelist: Option<Whitelist>,
    cascade: bool,
    handlers: HandlerTable<C>,
    listeners: ListenerRegistry<C>,
    queue: VecDeque<Event>,
    scheduler: Scheduler<C>,
    heartbeat: Heartbeat,
    default_heartbeat: Duration,
    heartbeat_timer: Option<TimerKey>,
    running: bool,
    history: StateHistory,
    context: C,
}

impl<C: 'static> StateMachine<C> {
    pub(crate) fn from_parts(parts: MachineParts<C>) -> Self {
        let mut machine = Self {
            id: parts.id,
            debug: parts.debug,
            states: parts.states,
            current: Some(parts.initial),
            fault: None,
            whitelist: parts.whitelist,
            cascade: parts.cascade,
            handlers: parts.handlers,
            listeners: ListenerRegistry::default(),
            queue: VecDeque::new(),
            scheduler: Scheduler::new(parts.clock),
            heartbeat: Heartbeat::Disabled,
            default_heartbeat: parts.default_heartbeat,
            heartbeat_timer: None,
            running: false,
            history: StateHistory::with_limit(parts.history_limit),
            context: parts.context,
        };
        verbose!(
            machine,
            state = ?machine.state_name(),
            handlers = machine.handlers.len(),
            "machine created"
        );
        machine.set_heartbeat(parts.heartbeat);
        machine
    }

    /// Diagnostic label of this machine.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn states(&self) -> &StateTable {
        &self.states
    }

    /// Current state, `None` once the machine has panicked.
    pub fn state(&self) -> Option<StateId> {
        self.current
    }

    pub fn state_name(&self) -> Option<&str> {
        self.current.and_then(|id| self.states.name(id))
    }

    pub fn is_panicked(&self) -> bool {
        self.current.is_none()
    }

    /// The condition that first panicked the machine.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Check whether the current state is one of `states`.
    ///
    /// Unknown states are an error even when the machine has panicked.
    pub fn is<I, R>(&self, states: I) -> Result<bool, MachineError>
    where
        I: IntoIterator<Item = R>,
        R: Into<StateRef>,
    {
        let states = self.states.normalize(states)?;
        Ok(self.current.is_some_and(|current| states.contains(&current)))
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    pub fn is_cascading(&self) -> bool {
        self.cascade
    }

    /// Events waiting in the queue, next one first.
    pub fn queued_events(&self) -> impl Iterator<Item = &Event> {
        self.queue.iter()
    }

    /// Tasks ready to run on the next turns, not counting timers.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    /// Timers not yet due, heartbeat included. Cancelled timeouts are not
    /// counted.
    pub fn pending_timers(&self) -> usize {
        self.scheduler.timers()
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.scheduler.clock()
    }

    // ----- event queue ---------------------------------------------------

    /// Append an event to the queue. It is dispatched on a later turn, never
    /// inside this call.
    pub fn push(&mut self, event: impl Into<Event>) {
        let event = event.into();
        verbose!(self, event = %event.id, "queued");
        self.queue.push_back(event);
        self.scheduler.defer(Task::Drain);
    }

    /// Push `event` once `delay` has elapsed, unless the returned handle is
    /// cancelled first. A delay past the range of the clock never fires.
    pub fn schedule(&mut self, delay: Duration, event: impl Into<Event>) -> TimeoutHandle {
        let handle = TimeoutHandle::new(event.into(), delay);
        verbose!(self, event = %handle.event().id, delay = ?delay, "scheduling");
        self.scheduler.start_timer(delay, TimerAction::Fire(handle.clone()));
        handle
    }

    /// Schedule a [`TIMEOUT_EVENT`] carrying `token` as payload.
    ///
    /// The event is named plain `timeout`, without a `$` prefix, so it is
    /// caught by `____timeout` and `__S__timeout` handlers like any other
    /// named event.
    pub fn timeout(&mut self, delay: Duration, token: impl Into<Value>) -> TimeoutHandle {
        self.schedule(delay, Event::with_payload(TIMEOUT_EVENT, token))
    }

    // ----- run loop -------------------------------------------------------

    /// Run a single scheduling turn. Timers already due are queued first.
    ///
    /// Returns `Ok(false)` when there was nothing to do, and also when called
    /// from a handler or listener while a turn is already running: the queued
    /// work stays for the outer loop.
    pub fn run_once(&mut self) -> Result<bool, MachineError> {
        if self.running {
            verbose!(self, "run requested during a turn, ignored");
            return Ok(false);
        }
        self.scheduler.promote_due();
        let Some(task) = self.scheduler.pop() else {
            return Ok(false);
        };

        self.running = true;
        let result = self.execute(task);
        self.running = false;
        result.map(|()| true)
    }

    /// Run turns until no work is ready. Timers that fall due meanwhile are
    /// included; the clock is not advanced.
    ///
    /// Stops at the first panic, leaving later tasks queued.
    pub fn run_until_idle(&mut self) -> Result<usize, MachineError> {
        let mut turns = 0;
        while self.run_once()? {
            turns += 1;
        }
        Ok(turns)
    }

    /// Run for `duration` of clock time, sleeping between timer deadlines.
    ///
    /// A duration past the range of the clock runs until no timer is left.
    /// Inside a running turn this does nothing and returns `Ok(0)`.
    pub fn run_for(&mut self, duration: Duration) -> Result<usize, MachineError> {
        if self.running {
            verbose!(self, "run requested during a turn, ignored");
            return Ok(0);
        }
        let clock = Arc::clone(self.scheduler.clock());
        let end = clock.now().checked_add(duration);
        let mut turns = self.run_until_idle()?;

        while let Some(deadline) = self.scheduler.next_deadline() {
            if end.is_some_and(|end| deadline > end) {
                break;
            }
            clock.sleep_until(deadline);
            turns += self.run_until_idle()?;
        }

        if let Some(end) = end {
            clock.sleep_until(end);
            turns += self.run_until_idle()?;
        }
        Ok(turns)
    }

    fn execute(&mut self, task: Task<C>) -> Result<(), MachineError> {
        match task {
            Task::Drain => match self.queue.pop_front() {
                Some(event) => self.dispatch(event),
                None => Ok(()),
            },
            Task::Heartbeat(key) => {
                if self.heartbeat_timer != Some(key) {
                    return Ok(());
                }
                self.heartbeat_timer = self
                    .heartbeat
                    .interval(self.default_heartbeat)
                    .and_then(|interval| {
                        self.scheduler.start_timer(interval, TimerAction::Heartbeat)
                    });
                self.dispatch(Event::heartbeat())
            }
            Task::Fire(handle) => {
                if handle.claim() {
                    self.push(handle.event().clone());
                }
                Ok(())
            }
            Task::Notify {
                listener,
                callback,
                from,
                to,
            } => {
                verbose!(self, listener = %listener, "calling state change handler");
                callback(self, from, to);
                Ok(())
            }
        }
    }

    // ----- dispatch -------------------------------------------------------

    fn dispatch(&mut self, event: Event) -> Result<(), MachineError> {
        let Some(state) = self.current else {
            if event.is_heartbeat() {
                return Ok(());
            }
            return Err(self.raise(Fault::Relapse));
        };

        let candidates = self.handlers.candidates(state, &event.id);
        for (tier, handler) in Tier::ORDER.into_iter().zip(candidates) {
            let Some(handler) = handler else {
                continue;
            };
            verbose!(
                self,
                event = %event.id,
                handler = %self.handler_label(tier, state, &event),
                "processing"
            );

            let result = catch_unwind(AssertUnwindSafe(|| handler(self, &event)));
            let outcome = match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => return Err(self.handler_failed(&event, err.to_string())),
                Err(payload) => {
                    return Err(self.handler_failed(&event, panic_message(payload.as_ref())))
                }
            };

            if self.current.is_none() {
                return Err(self.relapse_error());
            }
            if self.apply_outcome(outcome, &event) {
                return Ok(());
            }
            if !self.cascade {
                break;
            }
        }

        if event.is_heartbeat() {
            return Ok(());
        }

        let state = self.current_label();
        tracing::error!(
            machine = %self.id,
            state = %state,
            event = %event.id,
            "unhandled condition"
        );
        Err(self.raise(Fault::Unhandled {
            state,
            event: event.id.to_string(),
        }))
    }

    /// Interpret a handler outcome. Returns whether the event counts as
    /// handled.
    fn apply_outcome(&mut self, outcome: Outcome, event: &Event) -> bool {
        match outcome {
            Outcome::Handled => true,
            Outcome::Retry => {
                verbose!(self, event = %event.id, "zero-transition");
                self.queue.push_front(event.clone());
                self.scheduler.defer(Task::Drain);
                true
            }
            Outcome::Emit(next) => {
                verbose!(self, event = %next.id, "zero-transition with event");
                self.queue.push_front(next);
                self.scheduler.defer(Task::Drain);
                true
            }
            Outcome::Unhandled => false,
        }
    }

    fn handler_failed(&mut self, event: &Event, reason: String) -> MachineError {
        if self.current.is_none() {
            return self.relapse_error();
        }
        let state = self.current_label();
        tracing::error!(
            machine = %self.id,
            state = %state,
            event = %event.id,
            error = %reason,
            "exception raised while handling event"
        );
        self.raise(Fault::HandlerFailed {
            state,
            event: event.id.to_string(),
            reason,
        })
    }

    fn handler_label(&self, tier: Tier, state: StateId, event: &Event) -> String {
        let state = self.states.label(state);
        match tier {
            Tier::StateEvent => format!("__{}__{}", state, event.id),
            Tier::State => format!("__{}__", state),
            Tier::Event => format!("____{}", event.id),
        }
    }

    fn current_label(&self) -> String {
        self.current
            .map(|id| self.states.label(id))
            .unwrap_or_else(|| "undefined".to_string())
    }

    // ----- transitions ----------------------------------------------------

    /// Move to `target`.
    ///
    /// A self-transition is a no-op that notifies nobody. Unknown targets,
    /// transitions refused by the whitelist and any transition attempted
    /// after a panic all panic the machine. Listeners run on later turns.
    pub fn transition(&mut self, target: impl Into<StateRef>) -> Result<StateId, MachineError> {
        let Some(current) = self.current else {
            return Err(self.raise(Fault::Relapse));
        };

        let target = target.into();
        let next = match self.states.resolve(&target) {
            Ok(next) => next,
            Err(_) => return Err(self.raise(Fault::UnknownState(target.to_string()))),
        };

        if next == current {
            return Ok(current);
        }

        if let Some(whitelist) = &self.whitelist {
            if !whitelist.permits(current, next) {
                let fault = Fault::ForbiddenTransition {
                    from: self.states.label(current),
                    to: self.states.label(next),
                };
                return Err(self.raise(fault));
            }
        }

        self.current = Some(next);
        verbose!(self, from = %self.states.label(current), to = %self.states.label(next), "transitioning");
        self.history.record(TransitionRecord {
            from: current,
            to: next,
            timestamp: Utc::now(),
        });
        self.notify(current, next);
        Ok(next)
    }

    fn notify(&mut self, from: StateId, to: StateId) {
        for triggered in self.listeners.trigger(from, to) {
            verbose!(self, listener = %triggered.id, "triggering state change handler");
            if let Some(removed) = &triggered.removed {
                verbose!(
                    self,
                    listener = %removed.id,
                    triggered = removed.triggered,
                    "unregistered one-shot state change handler"
                );
            }
            self.scheduler.defer(Task::Notify {
                listener: triggered.id,
                callback: triggered.callback,
                from,
                to,
            });
        }
    }

    // ----- panic lifecycle ------------------------------------------------

    /// Panic the machine on purpose. The returned error carries `message`, or
    /// the default message when `None`.
    pub fn panic(&mut self, message: Option<&str>) -> MachineError {
        self.raise(Fault::Explicit(message.map(str::to_string)))
    }

    /// The single exit into the undefined state.
    fn raise(&mut self, fault: Fault) -> MachineError {
        if fault == Fault::Relapse {
            verbose!(self, "event refused: machine already panicked");
        } else {
            tracing::error!(
                machine = %self.id,
                state = %self.current_label(),
                fault = %fault,
                "state machine panic"
            );
        }
        self.current = None;
        self.stop_heartbeat();
        if self.fault.is_none() {
            self.fault = Some(fault.clone());
        }
        MachineError::Panic(fault)
    }

    fn relapse_error(&self) -> MachineError {
        MachineError::Panic(self.fault.clone().unwrap_or(Fault::Relapse))
    }

    // ----- listeners ------------------------------------------------------

    fn add_listener<I, R, F>(
        &mut self,
        states: I,
        callback: F,
        once: bool,
        direction: Direction,
    ) -> Result<ListenerId, MachineError>
    where
        I: IntoIterator<Item = R>,
        R: Into<StateRef>,
        F: Fn(&mut StateMachine<C>, StateId, StateId) + Send + Sync + 'static,
    {
        let states = self.states.normalize(states)?;
        let id = self.listeners.add(states, Arc::new(callback), once, direction);
        verbose!(self, listener = %id, direction = %direction, once, "registered state change handler");
        Ok(id)
    }

    /// Call `callback` every time the machine enters one of `states`.
    pub fn on<I, R, F>(&mut self, states: I, callback: F) -> Result<ListenerId, MachineError>
    where
        I: IntoIterator<Item = R>,
        R: Into<StateRef>,
        F: Fn(&mut StateMachine<C>, StateId, StateId) + Send + Sync + 'static,
    {
        self.add_listener(states, callback, false, Direction::Enter)
    }

    /// Call `callback` the first time the machine enters one of `states`.
    pub fn once<I, R, F>(&mut self, states: I, callback: F) -> Result<ListenerId, MachineError>
    where
        I: IntoIterator<Item = R>,
        R: Into<StateRef>,
        F: Fn(&mut StateMachine<C>, StateId, StateId) + Send + Sync + 'static,
    {
        self.add_listener(states, callback, true, Direction::Enter)
    }

    /// Call `callback` every time the machine leaves one of `states`.
    pub fn off<I, R, F>(&mut self, states: I, callback: F) -> Result<ListenerId, MachineError>
    where
        I: IntoIterator<Item = R>,
        R: Into<StateRef>,
        F: Fn(&mut StateMachine<C>, StateId, StateId) + Send + Sync + 'static,
    {
        self.add_listener(states, callback, false, Direction::Leave)
    }

    /// Call `callback` the first time the machine leaves one of `states`.
    pub fn once_off<I, R, F>(&mut self, states: I, callback: F) -> Result<ListenerId, MachineError>
    where
        I: IntoIterator<Item = R>,
        R: Into<StateRef>,
        F: Fn(&mut StateMachine<C>, StateId, StateId) + Send + Sync + 'static,
    {
        self.add_listener(states, callback, true, Direction::Leave)
    }

    /// Unregister a listener. Unknown handles yield `None`.
    pub fn remove_listener(&mut self, id: ListenerId) -> Option<RemovedListener> {
        let removed = self.listeners.remove(id)?;
        verbose!(
            self,
            listener = %id,
            triggered = removed.triggered,
            "unregistered state change handler"
        );
        Some(removed)
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ----- heartbeat ------------------------------------------------------

    pub fn heartbeat(&self) -> Heartbeat {
        self.heartbeat
    }

    /// Change the heartbeat, replacing any running heartbeat timer. Setting
    /// the current value again does nothing.
    pub fn set_heartbeat(&mut self, heartbeat: impl Into<Heartbeat>) {
        let heartbeat = heartbeat.into().normalized();
        if heartbeat == self.heartbeat {
            return;
        }
        verbose!(self, heartbeat = ?heartbeat, "setting heartbeat");
        self.heartbeat = heartbeat;
        self.start_heartbeat();
    }

    pub fn is_heartbeat_running(&self) -> bool {
        self.heartbeat_timer.is_some()
    }

    fn start_heartbeat(&mut self) {
        self.stop_heartbeat();
        let Some(interval) = self.heartbeat.interval(self.default_heartbeat) else {
            return;
        };
        verbose!(self, interval = ?interval, "installing heartbeat");
        self.heartbeat_timer = self.scheduler.start_timer(interval, TimerAction::Heartbeat);
    }

    fn stop_heartbeat(&mut self) {
        let Some(key) = self.heartbeat_timer.take() else {
            return;
        };
        verbose!(self, "uninstalling heartbeat");
        self.scheduler.cancel_timer(key);
    }

    /// Release the heartbeat timer. Safe to call more than once.
    pub fn destroy(&mut self) {
        verbose!(self, "destroying machine");
        self.stop_heartbeat();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

impl<C: 'static> std::fmt::Debug for StateMachine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("state", &self.state_name())
            .field("fault", &self.fault)
            .field("queued", &self.queue.len())
            .field("heartbeat", &self.heartbeat)
            .finish_non_exhaustive()
    }
}
