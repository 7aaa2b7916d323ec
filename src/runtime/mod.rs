//! The running machine and everything it schedules.
//!
//! # Key Concepts
//!
//! - **Event queue**: events are pushed to the tail and drained one per
//!   scheduling turn; zero-transitions re-enter at the head
//! - **Handlers**: resolved by specificity, optionally cascading
//! - **Listeners**: deferred callbacks on entering or leaving states
//! - **Heartbeat**: a recurring null event
//! - **Panic**: the terminal undefined state every fatal condition ends in
//!
//! # Driving a machine
//!
//! The machine owns its scheduler but never runs on its own. Hosts call
//! [`StateMachine::run_until_idle`] after feeding it events, or
//! [`StateMachine::run_for`] to let timers and heartbeats fire. With the
//! `tokio` feature, [`driver::run_for`] does the same on a Tokio runtime.

mod clock;
mod dispatch;
#[cfg(feature = "tokio")]
pub mod driver;
mod error;
mod heartbeat;
mod listeners;
mod machine;
mod scheduler;

pub(crate) use dispatch::HandlerTable;
pub(crate) use machine::MachineParts;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{pass, HandlerFn, Tier};
pub use error::{Fault, HandlerError, MachineError, DEFAULT_PANIC_MESSAGE};
pub use heartbeat::{Heartbeat, InvalidHeartbeat, MIN_HEARTBEAT};
pub use listeners::{Direction, ListenerFn, ListenerId, RemovedListener};
pub use machine::StateMachine;
pub use scheduler::TimeoutHandle;
