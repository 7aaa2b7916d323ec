//! Driving a machine from a Tokio runtime.
//!
//! The machine must use [`SystemClock`](super::SystemClock): deadlines are
//! compared against real time.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

use super::{MachineError, StateMachine};

/// Run `machine` for `duration`, awaiting between timer deadlines instead of
/// blocking the thread.
///
/// A duration past the range of `Instant` runs until no timer is left.
pub async fn run_for<C: 'static>(
    machine: &mut StateMachine<C>,
    duration: Duration,
) -> Result<usize, MachineError> {
    let end = Instant::now().checked_add(duration);
    let mut turns = 0;

    loop {
        turns += machine.run_until_idle()?;

        let deadline = machine.next_deadline().map(Instant::from_std);
        let wake = match (deadline, end) {
            (Some(deadline), Some(end)) => deadline.min(end),
            (Some(deadline), None) => deadline,
            (None, Some(end)) => end,
            (None, None) => return Ok(turns),
        };
        sleep_until(wake).await;

        if end.is_some_and(|end| wake >= end) {
            turns += machine.run_until_idle()?;
            return Ok(turns);
        }
    }
}
