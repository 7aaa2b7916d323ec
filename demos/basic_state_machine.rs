//! Basic State Machine
//!
//! A traffic light driven by its heartbeat.
//!
//! Key concepts:
//! - Handlers bound to state/event pairs and to the heartbeat
//! - A transition whitelist that only allows the legal light sequence
//! - Listeners that hear about transitions on a later turn
//! - A virtual clock so the demo runs instantly
//!
//! Run with: cargo run --example basic_state_machine

use heartwood::core::EventId;
use heartwood::runtime::{Clock, ManualClock};
use heartwood::{state_enum, Outcome, StateMachine, StateMachineBuilder};
use std::time::Duration;

state_enum! {
    enum Light {
        Red,
        Green,
        Yellow,
    }
}

/// Ticks spent in each light before moving on.
#[derive(Default)]
struct Timing {
    ticks: u32,
}

fn next(light: Light) -> Light {
    match light {
        Light::Red => Light::Green,
        Light::Green => Light::Yellow,
        Light::Yellow => Light::Red,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Basic State Machine Example ===\n");

    let clock = ManualClock::new();
    let start = clock.now();

    let mut machine: StateMachine<Timing> = StateMachineBuilder::<Timing>::new()
        .id("crossing")
        .states(Light::NAMES)
        .initial(Light::Red)
        .allow([Light::Red], [Light::Green])
        .allow([Light::Green], [Light::Yellow])
        .allow([Light::Yellow], [Light::Red])
        .heartbeat(1000u64)
        .clock(clock.clone())
        .on_any_state(EventId::Heartbeat, |machine, _| {
            machine.context_mut().ticks += 1;
            if machine.context().ticks < 3 {
                return Ok(Outcome::Handled);
            }
            machine.context_mut().ticks = 0;

            let current = machine.state().and_then(Light::from_id);
            if let Some(light) = current {
                machine.transition(next(light))?;
            }
            Ok(Outcome::Handled)
        })
        .on_event("Red", "pedestrian", |machine, _| {
            println!("  pedestrian waiting, shortening red");
            machine.context_mut().ticks = 2;
            Ok(Outcome::Handled)
        })
        .on_any_state("pedestrian", |_, _| Ok(Outcome::Handled))
        .build()
        .expect("valid light configuration");

    machine
        .on(Light::ALL.iter().copied(), move |machine, from, to| {
            let at = machine.clock().now() - start;
            let states = machine.states();
            println!(
                "  t={:>2}s  {} -> {}",
                at.as_secs(),
                states.label(from),
                states.label(to)
            );
        })
        .expect("known states");

    println!("Initial state: {:?}", machine.state_name());

    machine
        .run_for(Duration::from_secs(10))
        .expect("light keeps cycling");

    println!("\nA pedestrian presses the button:");
    machine.push("pedestrian");
    machine
        .run_for(Duration::from_secs(5))
        .expect("light keeps cycling");

    println!("\nPath so far: {:?}", machine.history().path());
    machine.destroy();

    println!("\n=== Example Complete ===");
}
