//! Property-based tests for the state table, queue ordering, listener
//! handles and whitelist semantics.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use heartwood::core::{StateId, StateRef, StateTable, TransitionRule, Whitelist};
use heartwood::runtime::{ListenerId, ManualClock};
use heartwood::{Event, Outcome, StateMachine, StateMachineBuilder};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;

const STATES: [&str; 5] = ["S0", "S1", "S2", "S3", "S4"];

fn recorder() -> StateMachine<Vec<String>> {
    StateMachineBuilder::<Vec<String>>::new()
        .states(["S"])
        .clock(ManualClock::new())
        .on_state("S", |machine, event: &Event| {
            machine.context_mut().push(event.id.to_string());
            Ok(Outcome::Handled)
        })
        .build()
        .unwrap()
}

prop_compose! {
    fn state_names()(names in btree_set("[a-z]{1,6}", 1..12)) -> Vec<String> {
        names.into_iter().collect()
    }
}

prop_compose! {
    fn rule()(
        from in vec(0..STATES.len(), 0..3),
        to in vec(0..STATES.len(), 0..3),
    ) -> (Vec<usize>, Vec<usize>) {
        (from, to)
    }
}

/// Listener operations: `Some(i)` removes the i-th live handle, `None` adds.
fn listener_ops() -> impl Strategy<Value = Vec<Option<usize>>> {
    vec(prop_oneof![Just(None), (0..8usize).prop_map(Some)], 1..40)
}

proptest! {
    #[test]
    fn state_table_is_a_bijection(names in state_names()) {
        let table = StateTable::new(names.clone()).unwrap();

        prop_assert_eq!(table.len(), names.len());
        for (index, name) in names.iter().enumerate() {
            prop_assert_eq!(table.id(name), Some(StateId(index)));
            prop_assert_eq!(table.name(StateId(index)), Some(name.as_str()));
            prop_assert_eq!(
                table.resolve(&StateRef::Index(index)).unwrap(),
                table.resolve(&StateRef::from(name)).unwrap()
            );
        }
        prop_assert!(table.resolve(&StateRef::Index(names.len())).is_err());
    }

    #[test]
    fn duplicate_names_are_rejected(names in state_names(), pick in any::<prop::sample::Index>()) {
        let mut with_duplicate = names.clone();
        with_duplicate.push(pick.get(&names).clone());

        prop_assert_eq!(StateTable::new(with_duplicate), Err(pick.get(&names).clone()));
    }

    #[test]
    fn pushed_events_dispatch_in_order(events in vec("[a-z]{1,8}", 0..30)) {
        let mut machine = recorder();
        for event in &events {
            machine.push(event.as_str());
        }
        machine.run_until_idle().unwrap();

        prop_assert_eq!(machine.context(), &events);
        prop_assert_eq!(machine.queued_events().count(), 0);
    }

    #[test]
    fn listener_handles_stay_dense(ops in listener_ops()) {
        let mut machine = recorder();
        let mut live: Vec<ListenerId> = Vec::new();

        for op in ops {
            match op {
                Some(i) if !live.is_empty() => {
                    let id = live.remove(i % live.len());
                    prop_assert!(machine.remove_listener(id).is_some());
                }
                _ => {
                    let lowest_free = (0..)
                        .map(ListenerId)
                        .find(|id| !live.contains(id))
                        .unwrap();
                    let id = machine.on(["S"], |_, _, _| {}).unwrap();
                    prop_assert_eq!(id, lowest_free);
                    live.push(id);
                }
            }
            prop_assert_eq!(machine.listener_count(), live.len());
        }
    }

    #[test]
    fn whitelist_matches_naive_model(
        rules in vec(rule(), 0..4),
        from in 0..STATES.len(),
        to in 0..STATES.len(),
    ) {
        let whitelist = Whitelist::new(
            rules
                .iter()
                .map(|(f, t)| {
                    TransitionRule::new(
                        f.iter().copied().map(StateId).collect(),
                        t.iter().copied().map(StateId).collect(),
                    )
                })
                .collect(),
        );
        let expected = rules
            .iter()
            .any(|(f, t)| f.contains(&from) && t.contains(&to));

        prop_assert_eq!(whitelist.permits(StateId(from), StateId(to)), expected);
    }

    #[test]
    fn machine_enforces_whitelist(
        rules in vec(rule(), 1..4),
        to in 0..STATES.len(),
    ) {
        let mut builder = StateMachineBuilder::<()>::new()
            .states(STATES)
            .clock(ManualClock::new());
        for (f, t) in &rules {
            builder = builder.allow(f.clone(), t.clone());
        }
        let mut machine = builder.build().unwrap();

        let allowed = to == 0 || rules.iter().any(|(f, t)| f.contains(&0) && t.contains(&to));
        let result = machine.transition(to);

        prop_assert_eq!(result.is_ok(), allowed);
        prop_assert_eq!(machine.is_panicked(), !allowed);
        if allowed {
            prop_assert_eq!(machine.state(), Some(StateId(to)));
        }
    }
}
