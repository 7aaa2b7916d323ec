//! Transition whitelist: the only guard the engine applies to state changes.
//!
//! A whitelist is an ordered list of rules, each pairing a set of source
//! states with a set of destination states. Evaluation is a pure function of
//! the current state and the requested target.

use super::state::StateId;

/// One `(sources -> destinations)` rule.
///
/// A rule with an empty source or destination set can never match. It does
/// not forbid anything by itself; it simply never grants a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: Vec<StateId>,
    pub to: Vec<StateId>,
}

impl TransitionRule {
    pub fn new(from: Vec<StateId>, to: Vec<StateId>) -> Self {
        Self { from, to }
    }

    /// Check whether this rule grants `from -> to`.
    pub fn matches(&self, from: StateId, to: StateId) -> bool {
        self.from.contains(&from) && self.to.contains(&to)
    }
}

/// Ordered set of transition rules.
///
/// A transition is permitted iff some rule's source set contains the current
/// state and the same rule's destination set contains the target.
///
/// # Example
///
/// ```rust
/// use heartwood::core::{StateId, TransitionRule, Whitelist};
///
/// let idle = StateId(0);
/// let running = StateId(1);
///
/// let whitelist = Whitelist::new(vec![TransitionRule::new(vec![idle], vec![running])]);
///
/// assert!(whitelist.permits(idle, running));
/// assert!(!whitelist.permits(running, idle));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Whitelist {
    rules: Vec<TransitionRule>,
}

impl Whitelist {
    pub fn new(rules: Vec<TransitionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    pub fn permits(&self, from: StateId, to: StateId) -> bool {
        self.rules.iter().any(|rule| rule.matches(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: StateId = StateId(0);
    const B: StateId = StateId(1);
    const C: StateId = StateId(2);

    #[test]
    fn rule_requires_both_sides() {
        let rule = TransitionRule::new(vec![A], vec![B]);
        assert!(rule.matches(A, B));
        assert!(!rule.matches(B, A));
        assert!(!rule.matches(A, C));
    }

    #[test]
    fn rules_are_combined_with_or() {
        let whitelist = Whitelist::new(vec![
            TransitionRule::new(vec![A], vec![B]),
            TransitionRule::new(vec![B, C], vec![A]),
        ]);

        assert!(whitelist.permits(A, B));
        assert!(whitelist.permits(B, A));
        assert!(whitelist.permits(C, A));
        assert!(!whitelist.permits(A, C));
    }

    #[test]
    fn empty_sets_never_match() {
        let whitelist = Whitelist::new(vec![
            TransitionRule::new(vec![], vec![B]),
            TransitionRule::new(vec![A], vec![]),
            TransitionRule::new(vec![C], vec![A]),
        ]);

        assert!(!whitelist.permits(A, B));
        assert!(whitelist.permits(C, A));
    }

    #[test]
    fn empty_whitelist_grants_nothing() {
        let whitelist = Whitelist::default();
        assert!(!whitelist.permits(A, B));
    }
}
