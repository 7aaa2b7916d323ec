//! The `debug` option and the error log, captured with tracing-subscriber.

use heartwood::runtime::ManualClock;
use heartwood::{Outcome, StateMachineBuilder};
use std::io;
use std::sync::{Arc, Mutex};
use tracing::Level;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture<F: FnOnce()>(run: F) -> String {
    let output = Capture::default();
    let writer = output.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, run);
    output.contents()
}

#[test]
fn debug_machine_traces_internal_operations() {
    let logs = capture(|| {
        let mut machine = StateMachineBuilder::<()>::new()
            .id("traced")
            .states(["A", "B"])
            .debug(true)
            .clock(ManualClock::new())
            .on_event("A", "go", |machine, _| {
                machine.transition("B")?;
                Ok(Outcome::Handled)
            })
            .build()
            .unwrap();
        machine.on(["B"], |_, _, _| {}).unwrap();

        machine.push("go");
        machine.run_until_idle().unwrap();
    });

    assert!(logs.contains("machine=traced"));
    for message in [
        "machine created",
        "queued",
        "processing",
        "__A__go",
        "transitioning",
        "registered state change handler",
        "calling state change handler",
    ] {
        assert!(logs.contains(message), "missing {message:?} in:\n{logs}");
    }
}

#[test]
fn quiet_machine_only_logs_failures() {
    let logs = capture(|| {
        let mut machine = StateMachineBuilder::<()>::new()
            .id("quiet")
            .states(["A"])
            .clock(ManualClock::new())
            .on_state("A", |_, _| Ok(Outcome::Handled))
            .build()
            .unwrap();

        machine.push("fine");
        machine.run_until_idle().unwrap();
        machine.panic(Some("gave up"));
    });

    assert!(!logs.contains("DEBUG"));
    assert!(logs.contains("ERROR"));
    assert!(logs.contains("state machine panic"));
    assert!(logs.contains("gave up"));
}
