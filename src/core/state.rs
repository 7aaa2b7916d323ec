//! State identifiers and the name/index table.
//!
//! A machine declares its states once, as an ordered list of distinct names.
//! Every state is then addressable either by name or by its ordinal index.

use crate::runtime::MachineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Ordinal index of a declared state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a state, by name or by index.
///
/// Serialized untagged, so configuration files may use either `"IDLE"` or `0`.
///
/// # Example
///
/// ```rust
/// use heartwood::core::{StateRef, StateTable};
///
/// let table = StateTable::new(["IDLE", "RUNNING"]).unwrap();
///
/// assert_eq!(table.resolve(&StateRef::from("RUNNING")).unwrap().index(), 1);
/// assert_eq!(table.resolve(&StateRef::from(0)).unwrap().index(), 0);
/// assert!(table.resolve(&StateRef::from("DONE")).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateRef {
    Index(usize),
    Name(String),
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for StateRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for StateRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for StateRef {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<usize> for StateRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<StateId> for StateRef {
    fn from(id: StateId) -> Self {
        Self::Index(id.0)
    }
}

impl From<&StateRef> for StateRef {
    fn from(state: &StateRef) -> Self {
        state.clone()
    }
}

/// Bijection between declared state names and their ordinal indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTable {
    names: Vec<String>,
    index: HashMap<String, StateId>,
}

impl StateTable {
    /// Build the forward and reverse tables from an ordered list of names.
    ///
    /// Returns the first duplicated name on failure: a repeated name would
    /// break the bijection.
    pub fn new<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), StateId(i)).is_some() {
                return Err(name.clone());
            }
        }

        Ok(Self { names, index })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of a state, if the id belongs to this table.
    pub fn name(&self, id: StateId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    /// Id of a state name, if declared.
    pub fn id(&self, name: &str) -> Option<StateId> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn resolve(&self, state: &StateRef) -> Result<StateId, MachineError> {
        match state {
            StateRef::Index(i) if *i < self.names.len() => Ok(StateId(*i)),
            StateRef::Name(name) => self
                .id(name)
                .ok_or_else(|| MachineError::UnknownState(name.clone())),
            other => Err(MachineError::UnknownState(other.to_string())),
        }
    }

    /// Resolve a group of state references, preserving order and duplicates.
    pub fn normalize<I, R>(&self, states: I) -> Result<Vec<StateId>, MachineError>
    where
        I: IntoIterator<Item = R>,
        R: Into<StateRef>,
    {
        states
            .into_iter()
            .map(|state| self.resolve(&state.into()))
            .collect()
    }

    /// Name of a state for display; unknown ids render as `#index`.
    pub fn label(&self, id: StateId) -> String {
        self.name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StateTable {
        StateTable::new(["IDLE", "RUNNING", "DONE"]).unwrap()
    }

    #[test]
    fn table_maps_names_to_indices() {
        let table = table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.id("IDLE"), Some(StateId(0)));
        assert_eq!(table.id("DONE"), Some(StateId(2)));
        assert_eq!(table.name(StateId(1)), Some("RUNNING"));
        assert_eq!(table.name(StateId(3)), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = StateTable::new(["A", "B", "A"]);
        assert_eq!(result, Err("A".to_string()));
    }

    #[test]
    fn resolve_accepts_names_and_indices() {
        let table = table();
        assert_eq!(table.resolve(&"DONE".into()).unwrap(), StateId(2));
        assert_eq!(table.resolve(&1.into()).unwrap(), StateId(1));
    }

    #[test]
    fn resolve_rejects_unknown_states() {
        let table = table();
        assert_eq!(
            table.resolve(&"PAUSED".into()),
            Err(MachineError::UnknownState("PAUSED".to_string()))
        );
        assert_eq!(
            table.resolve(&7.into()),
            Err(MachineError::UnknownState("7".to_string()))
        );
    }

    #[test]
    fn normalize_preserves_order_and_duplicates() {
        let table = table();
        let ids = table
            .normalize([StateRef::from("DONE"), 0.into(), "DONE".into()])
            .unwrap();
        assert_eq!(ids, vec![StateId(2), StateId(0), StateId(2)]);
    }

    #[test]
    fn normalize_fails_on_any_unknown_entry() {
        let table = table();
        assert!(table.normalize(["IDLE", "NOPE"]).is_err());
    }

    #[test]
    fn state_ref_deserializes_untagged() {
        let refs: Vec<StateRef> = serde_json::from_str(r#"["IDLE", 2]"#).unwrap();
        assert_eq!(refs, vec![StateRef::from("IDLE"), StateRef::Index(2)]);
    }
}
