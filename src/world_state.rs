//! World state representation for regressive GOAP.
//!
//! This module provides the [`WorldState`] structure, which is used for:
//! - The start state the planner regresses towards
//! - The goal state built from a goal's preconditions
//! - The intermediate states stored in every search node
//! - The live state the executor revalidates actions against
//!
//! A worldstate maps [`Condition`]s to [`Value`]s. A condition can be in one
//! of three situations: never recorded, recorded with an unknown value, or
//! recorded with a value. Only the first one is a lookup error.
//!
//! # Example
//!
//! ```
//! use rgoap::{Condition, Value, WorldState};
//!
//! let door = Condition::new("door");
//! let at_door = Condition::new("at_door");
//!
//! let mut start = WorldState::new();
//! start.memorize_condition_value(door.clone(), "closed");
//! start.memorize_condition_value(at_door.clone(), false);
//!
//! let mut goal = WorldState::new();
//! goal.memorize_condition_value(door.clone(), "open");
//!
//! assert!(!start.matches(&goal));
//! assert!(goal.unsatisfied_conditions(&start).contains(&door));
//!
//! start.memorize_condition_value(door, "open");
//! assert!(start.matches(&goal));
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::condition::Condition;
use crate::error::{GoapError, Result};

/// The value of one condition.
///
/// Numeric variants compare by numeric value, so `Int(2)` equals `Float(2.0)`.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric content of the value, `None` for booleans and text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Snapshot mapping conditions to values.
///
/// Copying a worldstate is a plain `clone()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldState {
    condition_values: HashMap<Condition, Option<Value>>,
}

impl WorldState {
    /// Creates an empty worldstate in which no condition is recorded.
    pub fn new() -> Self {
        Self {
            condition_values: HashMap::new(),
        }
    }

    /// Records `value` for `condition`, replacing any previous value.
    pub fn memorize_condition_value(&mut self, condition: Condition, value: impl Into<Value>) {
        self.condition_values.insert(condition, Some(value.into()));
    }

    /// Records `condition` without a known value.
    pub fn mark_unknown(&mut self, condition: Condition) {
        self.condition_values.insert(condition, None);
    }

    /// Gets the value recorded for `condition`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(&Value))` - the condition is recorded with a value
    /// * `Ok(None)` - the condition is recorded but its value is unknown
    ///
    /// # Errors
    ///
    /// Returns `GoapError::MissingConditionValue` if the condition was never
    /// recorded in this worldstate.
    pub fn get_condition_value(&self, condition: &Condition) -> Result<Option<&Value>> {
        self.condition_values
            .get(condition)
            .map(|v| v.as_ref())
            .ok_or_else(|| GoapError::MissingConditionValue(condition.name().to_string()))
    }

    pub fn contains(&self, condition: &Condition) -> bool {
        self.condition_values.contains_key(condition)
    }

    pub fn len(&self) -> usize {
        self.condition_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.condition_values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Condition, Option<&Value>)> {
        self.condition_values.iter().map(|(c, v)| (c, v.as_ref()))
    }

    /// Checks whether this worldstate satisfies every condition `other`
    /// records.
    ///
    /// Conditions recorded in `other` but not in `self` are not satisfied.
    /// Conditions only `self` records are ignored.
    pub fn matches(&self, other: &WorldState) -> bool {
        other
            .condition_values
            .iter()
            .all(|(condition, value)| self.condition_values.get(condition) == Some(value))
    }

    /// Returns the conditions recorded in this worldstate whose value differs
    /// from the one in `reference`.
    ///
    /// A condition `reference` never recorded counts as differing.
    pub fn unsatisfied_conditions(&self, reference: &WorldState) -> HashSet<Condition> {
        self.condition_values
            .iter()
            .filter(|(condition, value)| reference.condition_values.get(*condition) != Some(*value))
            .map(|(condition, _)| condition.clone())
            .collect()
    }

    /// Conditions that are recorded without a known value.
    pub fn unknown_conditions(&self) -> Vec<Condition> {
        let mut unknown: Vec<_> = self
            .condition_values
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(condition, _)| condition.clone())
            .collect();
        unknown.sort();
        unknown
    }

    /// Overwrites this worldstate with every condition `changes` records.
    pub fn merge(&mut self, changes: &WorldState) {
        for (condition, value) in changes.condition_values.iter() {
            self.condition_values.insert(condition.clone(), value.clone());
        }
    }

    /// Copy of this worldstate holding only the recorded `conditions`.
    pub fn restricted_to(&self, conditions: &HashSet<Condition>) -> WorldState {
        WorldState {
            condition_values: self
                .condition_values
                .iter()
                .filter(|(condition, _)| conditions.contains(*condition))
                .map(|(condition, value)| (condition.clone(), value.clone()))
                .collect(),
        }
    }

    fn sorted(&self) -> Vec<(&Condition, &Option<Value>)> {
        let mut items: Vec<_> = self.condition_values.iter().collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        items
    }
}

impl<V: Into<Value>> FromIterator<(Condition, V)> for WorldState {
    fn from_iter<I: IntoIterator<Item = (Condition, V)>>(iter: I) -> Self {
        let mut worldstate = WorldState::new();
        for (condition, value) in iter {
            worldstate.memorize_condition_value(condition, value);
        }
        worldstate
    }
}

impl fmt::Display for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (condition, value) in self.sorted() {
            if !first {
                write!(f, ", ")?;
            }
            match value {
                Some(value) => write!(f, "{}: {}", condition, value)?,
                None => write!(f, "{}: ?", condition)?,
            }
            first = false;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(pairs: &[(&str, Value)]) -> WorldState {
        pairs
            .iter()
            .map(|(k, v)| (Condition::new(k), v.clone()))
            .collect()
    }

    #[test]
    fn test_value_numeric_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::Float(2.5));
        assert_ne!(Value::Bool(true), Value::Int(1));
        assert_eq!(Value::from("open"), Value::Text("open".to_string()));
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_world_state_matches() {
        let state1 = ws(&[("key1", "value1".into()), ("key2", "value2".into())]);
        let state2 = ws(&[("key1", "value1".into())]);
        let state3 = ws(&[("key1", "different".into())]);

        assert!(state1.matches(&state2));
        assert!(!state2.matches(&state1));
        assert!(!state1.matches(&state3));
        assert!(state1.matches(&WorldState::new()));
    }

    #[test]
    fn test_matches_unknown_values() {
        let mut known = ws(&[("key1", Value::Int(1))]);
        let mut unknown = WorldState::new();
        unknown.mark_unknown(Condition::new("key1"));

        assert!(!known.matches(&unknown));
        known.mark_unknown(Condition::new("key1"));
        assert!(known.matches(&unknown));
    }

    #[test]
    fn test_unsatisfied_conditions() {
        let start = ws(&[("key1", "value1".into()), ("key2", "value2".into())]);
        let node = ws(&[
            ("key1", "value1".into()),
            ("key2", "updated".into()),
            ("key3", "value3".into()),
        ]);

        let unsatisfied = node.unsatisfied_conditions(&start);
        assert_eq!(unsatisfied.len(), 2);
        assert!(!unsatisfied.contains(&Condition::new("key1")));
        assert!(unsatisfied.contains(&Condition::new("key2")));
        assert!(unsatisfied.contains(&Condition::new("key3")));
    }

    #[test]
    fn test_get_condition_value() {
        let mut state = ws(&[("key1", Value::Int(3))]);
        state.mark_unknown(Condition::new("key2"));

        assert_eq!(
            state.get_condition_value(&Condition::new("key1")).unwrap(),
            Some(&Value::Int(3))
        );
        assert_eq!(state.get_condition_value(&Condition::new("key2")).unwrap(), None);
        assert!(matches!(
            state.get_condition_value(&Condition::new("key3")),
            Err(GoapError::MissingConditionValue(name)) if name == "key3"
        ));
        assert_eq!(state.unknown_conditions(), vec![Condition::new("key2")]);
    }

    #[test]
    fn test_copy_is_independent() {
        let original = ws(&[("key1", Value::Bool(false))]);
        let mut copy = original.clone();
        copy.memorize_condition_value(Condition::new("key1"), true);

        assert_eq!(
            original.get_condition_value(&Condition::new("key1")).unwrap(),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn test_merge() {
        let mut base = ws(&[("key1", "value1".into()), ("key2", "value2".into())]);
        let changes = ws(&[("key2", "updated".into()), ("key3", "value3".into())]);

        base.merge(&changes);

        assert_eq!(base.len(), 3);
        assert!(base.matches(&changes));
        assert_eq!(
            base.get_condition_value(&Condition::new("key1")).unwrap(),
            Some(&Value::from("value1"))
        );
    }

    #[test]
    fn test_restricted_to() {
        let state = ws(&[("key1", true.into()), ("key2", 3.into())]);
        let wanted: HashSet<_> = [Condition::new("key2"), Condition::new("key9")]
            .into_iter()
            .collect();

        let subset = state.restricted_to(&wanted);

        assert_eq!(subset.len(), 1);
        assert_eq!(
            subset.get_condition_value(&Condition::new("key2")).unwrap(),
            Some(&Value::Int(3))
        );
        assert!(!subset.contains(&Condition::new("key1")));
    }

    #[test]
    fn test_display_is_sorted() {
        let mut state = ws(&[("b", Value::Int(2)), ("a", Value::Bool(true))]);
        state.mark_unknown(Condition::new("c"));
        assert_eq!(format!("{}", state), "{a: true, b: 2, c: ?}");
    }
}
