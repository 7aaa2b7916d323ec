//! Driving a machine from a Tokio runtime.

#![cfg(feature = "tokio")]

use heartwood::core::EventId;
use heartwood::runtime::driver;
use heartwood::{Outcome, StateMachine, StateMachineBuilder};
use std::time::Duration;

fn ticking(interval_ms: u64) -> StateMachine<usize> {
    StateMachineBuilder::<usize>::new()
        .states(["A"])
        .heartbeat(interval_ms)
        .on_any_state(EventId::Heartbeat, |machine, _| {
            *machine.context_mut() += 1;
            Ok(Outcome::Handled)
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn driver_fires_heartbeats() {
    let mut machine = ticking(10);

    driver::run_for(&mut machine, Duration::from_millis(75))
        .await
        .unwrap();

    let ticks = *machine.context();
    assert!((3..=8).contains(&ticks), "unexpected tick count {ticks}");
}

#[tokio::test]
async fn driver_delivers_scheduled_events() {
    let mut machine = StateMachineBuilder::<Vec<String>>::new()
        .states(["A", "B"])
        .on_event("A", "wake", |machine, _| {
            machine.transition("B")?;
            Ok(Outcome::Handled)
        })
        .build()
        .unwrap();

    machine.schedule(Duration::from_millis(20), "wake");
    driver::run_for(&mut machine, Duration::from_millis(50))
        .await
        .unwrap();

    assert_eq!(machine.state_name(), Some("B"));
}

#[tokio::test]
async fn driver_stops_at_first_panic() {
    let mut machine = StateMachineBuilder::<()>::new()
        .states(["A"])
        .build()
        .unwrap();

    machine.schedule(Duration::from_millis(5), "nobody-handles-this");
    let result = driver::run_for(&mut machine, Duration::from_millis(30)).await;

    assert!(result.is_err());
    assert!(machine.is_panicked());
}

#[tokio::test]
async fn unbounded_run_returns_once_timers_are_spent() {
    let mut machine = StateMachineBuilder::<usize>::new()
        .states(["A"])
        .on_any_state("wake", |machine, _| {
            *machine.context_mut() += 1;
            Ok(Outcome::Handled)
        })
        .build()
        .unwrap();

    machine.schedule(Duration::from_millis(10), "wake");
    driver::run_for(&mut machine, Duration::MAX).await.unwrap();

    assert_eq!(*machine.context(), 1);
    assert_eq!(machine.next_deadline(), None);
}
