//! Bounded record of completed state transitions.

use super::state::StateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single completed transition.
///
/// Self-transitions are never recorded: they do not change the state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The state being left
    pub from: StateId,
    /// The state being entered
    pub to: StateId,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of transitions, keeping only the most recent ones.
///
/// # Example
///
/// ```rust
/// use heartwood::core::{StateHistory, StateId, TransitionRecord};
/// use chrono::Utc;
///
/// let mut history = StateHistory::with_limit(8);
///
/// history.record(TransitionRecord {
///     from: StateId(0),
///     to: StateId(1),
///     timestamp: Utc::now(),
/// });
/// history.record(TransitionRecord {
///     from: StateId(1),
///     to: StateId(2),
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(history.path(), vec![StateId(0), StateId(1), StateId(2)]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateHistory {
    records: VecDeque<TransitionRecord>,
    limit: usize,
}

/// Default number of transitions kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

impl Default for StateHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl StateHistory {
    /// Create an empty history keeping at most `limit` records.
    ///
    /// A limit of zero disables recording.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit,
        }
    }

    /// Append a record, evicting the oldest one when full.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.limit == 0 {
            return;
        }
        if self.records.len() == self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// States traversed: the source of the oldest kept record, then the
    /// destination of every record.
    pub fn path(&self) -> Vec<StateId> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.front() {
            path.push(first.from);
        }
        path.extend(self.records.iter().map(|record| record.to));
        path
    }

    /// Time between the oldest and newest kept records.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
