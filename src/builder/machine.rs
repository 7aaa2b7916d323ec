//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::builder::handler::HandlerKey;
use crate::config::{MachineConfig, RuleConfig};
use crate::core::{Event, EventId, Outcome, StateId, StateRef, StateTable, TransitionRule, Whitelist};
use crate::runtime::{
    Clock, HandlerError, HandlerFn, HandlerTable, Heartbeat, MachineParts, StateMachine,
    SystemClock,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use stillwater::validation::Validation;
use uuid::Uuid;

/// Builder for constructing state machines with a fluent API.
///
/// Options mirror [`MachineConfig`]; handlers are bound per [`HandlerKey`].
/// Everything is checked in [`build`](Self::build).
pub struct StateMachineBuilder<C: 'static = ()> {
    config: MachineConfig,
    context: C,
    clock: Option<Arc<dyn Clock>>,
    handlers: Vec<(HandlerKey, HandlerFn<C>)>,
    aliases: Vec<(HandlerKey, HandlerKey)>,
}

impl<C: Default + 'static> StateMachineBuilder<C> {
    /// Create a new builder with a default context.
    pub fn new() -> Self {
        Self::with_context(C::default())
    }
}

impl<C: Default + 'static> Default for StateMachineBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> StateMachineBuilder<C> {
    /// Create a new builder around a host context.
    pub fn with_context(context: C) -> Self {
        Self {
            config: MachineConfig::default(),
            context,
            clock: None,
            handlers: Vec::new(),
            aliases: Vec::new(),
        }
    }

    /// Replace every option with `config`.
    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse options from JSON.
    pub fn config_json(self, json: &str) -> Result<Self, BuildError> {
        Ok(self.config(MachineConfig::from_json(json)?))
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = Some(id.into());
        self
    }

    /// Declare the states in order. Indices follow declaration order.
    pub fn states<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.states = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        self
    }

    /// Set the initial state. Defaults to the first declared state.
    pub fn initial(mut self, state: impl Into<StateRef>) -> Self {
        self.config.init_state = Some(state.into());
        self
    }

    /// Add a whitelist rule allowing any of `from` to move to any of `to`.
    ///
    /// Without any rule every transition is allowed.
    pub fn allow<F, T, A, B>(mut self, from: F, to: T) -> Self
    where
        F: IntoIterator<Item = A>,
        T: IntoIterator<Item = B>,
        A: Into<StateRef>,
        B: Into<StateRef>,
    {
        let rule: RuleConfig = (
            from.into_iter().map(Into::into).collect(),
            to.into_iter().map(Into::into).collect(),
        );
        self.config
            .transition_whitelist
            .get_or_insert_with(Vec::new)
            .push(rule);
        self
    }

    pub fn cascade(mut self, cascade: bool) -> Self {
        self.config.cascade_handlers = cascade;
        self
    }

    pub fn heartbeat(mut self, heartbeat: impl Into<Heartbeat>) -> Self {
        self.config.heartbeat = heartbeat.into();
        self
    }

    /// Interval used for `heartbeat(true)`.
    pub fn default_heartbeat(mut self, interval: Duration) -> Self {
        self.config.default_heartbeat_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Use `clock` instead of the system clock.
    pub fn clock(self, clock: impl Clock + 'static) -> Self {
        self.shared_clock(Arc::new(clock))
    }

    pub fn shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Bind a handler to `key`.
    pub fn handler<F>(mut self, key: HandlerKey, handler: F) -> Self
    where
        F: Fn(&mut StateMachine<C>, &Event) -> Result<Outcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.push((key, Arc::new(handler)));
        self
    }

    /// Handle `event` in `state`.
    pub fn on_event<F>(self, state: impl Into<String>, event: impl Into<EventId>, handler: F) -> Self
    where
        F: Fn(&mut StateMachine<C>, &Event) -> Result<Outcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.handler(HandlerKey::state_event(state, event), handler)
    }

    /// Handle every event in `state`.
    pub fn on_state<F>(self, state: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut StateMachine<C>, &Event) -> Result<Outcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.handler(HandlerKey::state(state), handler)
    }

    /// Handle `event` in every state.
    pub fn on_any_state<F>(self, event: impl Into<EventId>, handler: F) -> Self
    where
        F: Fn(&mut StateMachine<C>, &Event) -> Result<Outcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.handler(HandlerKey::event(event), handler)
    }

    /// Bind a handler by conventional name (`__S__E`, `__S__`, `____E`).
    pub fn handle_named<F>(self, name: &str, handler: F) -> Result<Self, BuildError>
    where
        F: Fn(&mut StateMachine<C>, &Event) -> Result<Outcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Ok(self.handler(name.parse()?, handler))
    }

    /// Let `key` use the handler bound to `target`.
    ///
    /// Aliases may point at other aliases; chains are followed when the
    /// machine is built.
    pub fn alias(mut self, key: HandlerKey, target: HandlerKey) -> Self {
        self.aliases.push((key, target));
        self
    }

    /// [`alias`](Self::alias) with conventional names on both sides.
    pub fn alias_named(self, name: &str, target: &str) -> Result<Self, BuildError> {
        Ok(self.alias(name.parse()?, target.parse()?))
    }

    /// Build the state machine.
    ///
    /// Returns an error if the configuration is invalid or a handler
    /// registration cannot be resolved.
    pub fn build(self) -> Result<StateMachine<C>, BuildError> {
        let config = self.config;
        if let Validation::Failure(violations) = config.validate() {
            return Err(BuildError::InvalidConfig(
                violations.iter().cloned().collect(),
            ));
        }

        let states = StateTable::new(config.states.iter().cloned()).map_err(|name| {
            BuildError::InvalidConfig(vec![crate::config::ConfigViolation::DuplicateState(name)])
        })?;

        let initial = match &config.init_state {
            Some(state) => states.resolve(state)?,
            None => StateId(0),
        };

        let whitelist = match &config.transition_whitelist {
            Some(rules) => Some(Whitelist::new(
                rules
                    .iter()
                    .map(|(from, to)| {
                        Ok(TransitionRule::new(
                            states.normalize(from)?,
                            states.normalize(to)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, BuildError>>()?,
            )),
            None => None,
        };

        let handlers = bind_handlers(&states, self.handlers, self.aliases)?;

        let id = config.id.clone().unwrap_or_else(generate_id);

        Ok(StateMachine::from_parts(MachineParts {
            id,
            debug: config.debug,
            states,
            initial,
            whitelist,
            cascade: config.cascade_handlers,
            handlers,
            heartbeat: config.heartbeat,
            default_heartbeat: config.default_heartbeat(),
            history_limit: config.history_limit,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            context: self.context,
        }))
    }
}

fn generate_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("SM-{}", &uuid[..8])
}

/// Resolve registrations and aliases into the dispatch table.
fn bind_handlers<C: 'static>(
    states: &StateTable,
    handlers: Vec<(HandlerKey, HandlerFn<C>)>,
    aliases: Vec<(HandlerKey, HandlerKey)>,
) -> Result<HandlerTable<C>, BuildError> {
    let mut bound: HashMap<HandlerKey, HandlerFn<C>> = HashMap::with_capacity(handlers.len());
    for (key, handler) in handlers {
        if bound.contains_key(&key) {
            return Err(BuildError::DuplicateHandler(key.to_string()));
        }
        bound.insert(key, handler);
    }

    let mut targets: HashMap<HandlerKey, HandlerKey> = HashMap::with_capacity(aliases.len());
    for (key, target) in aliases {
        if bound.contains_key(&key) || targets.contains_key(&key) {
            return Err(BuildError::DuplicateHandler(key.to_string()));
        }
        targets.insert(key, target);
    }

    let resolved = targets
        .keys()
        .map(|key| Ok((key.clone(), follow_alias(&bound, &targets, key)?)))
        .collect::<Result<Vec<_>, BuildError>>()?;
    bound.extend(resolved);

    let mut table = HandlerTable::default();
    for (key, handler) in bound {
        let handler_name = key.to_string();
        let (state, event) = key.into_parts();
        let state = match state {
            Some(name) => Some(states.id(&name).ok_or(BuildError::UnknownHandlerState {
                handler: handler_name,
                state: name,
            })?),
            None => None,
        };
        table.insert(state, event, handler);
    }
    Ok(table)
}

fn follow_alias<C: 'static>(
    bound: &HashMap<HandlerKey, HandlerFn<C>>,
    targets: &HashMap<HandlerKey, HandlerKey>,
    alias: &HandlerKey,
) -> Result<HandlerFn<C>, BuildError> {
    let mut visited = HashSet::from([alias]);
    let mut current = alias;

    while let Some(target) = targets.get(current) {
        if let Some(handler) = bound.get(target) {
            return Ok(Arc::clone(handler));
        }
        if !visited.insert(target) {
            return Err(BuildError::AliasCycle(alias.to_string()));
        }
        current = target;
    }

    Err(BuildError::UnknownAliasTarget {
        alias: alias.to_string(),
        target: current.to_string(),
    })
}
