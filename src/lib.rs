//! Heartwood: an event-queue driven finite state machine runtime
//!
//! A machine owns a fixed set of named states, a FIFO of pending events and a
//! table of handlers resolved by specificity. Events are processed one per
//! scheduling turn; handlers move the machine between states, listeners hear
//! about it on later turns, and an optional heartbeat injects a recurring
//! null event. Anything fatal sends the machine into a terminal undefined
//! state.
//!
//! # Core Concepts
//!
//! - **States**: declared once, addressed by name or index
//! - **Handlers**: `__S__E`, `__S__` and `____E` tiers, optionally cascading
//! - **Whitelist**: optional rules restricting which transitions are legal
//! - **Listeners**: deferred callbacks on entering or leaving states
//! - **Scheduler**: explicit, host-driven; nothing runs inside the call that
//!   scheduled it
//!
//! # Example
//!
//! ```rust
//! use heartwood::runtime::ManualClock;
//! use heartwood::{Outcome, StateMachine, StateMachineBuilder};
//! use std::sync::{Arc, Mutex};
//!
//! let mut machine: StateMachine = StateMachineBuilder::new()
//!     .states(["IDLE", "RUNNING", "DONE"])
//!     .initial("IDLE")
//!     .on_event("IDLE", "start", |machine, _event| {
//!         machine.transition("RUNNING")?;
//!         Ok(Outcome::Handled)
//!     })
//!     .clock(ManualClock::new())
//!     .build()
//!     .unwrap();
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let log = Arc::clone(&seen);
//! machine
//!     .once(["RUNNING"], move |machine, from, to| {
//!         let states = machine.states();
//!         log.lock().unwrap().push((states.label(from), states.label(to)));
//!     })
//!     .unwrap();
//!
//! machine.push("start");
//! machine.run_until_idle().unwrap();
//!
//! assert_eq!(machine.state_name(), Some("RUNNING"));
//! assert_eq!(
//!     *seen.lock().unwrap(),
//!     vec![("IDLE".to_string(), "RUNNING".to_string())]
//! );
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod runtime;

// Re-export commonly used types
pub use builder::{BuildError, HandlerKey, StateMachineBuilder};
pub use config::MachineConfig;
pub use core::{Event, EventId, Outcome, StateId, StateRef};
pub use runtime::{Fault, HandlerError, Heartbeat, MachineError, StateMachine, TimeoutHandle};
