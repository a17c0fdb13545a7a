//! Conditions and the registry that knows how to read them.
//!
//! A [`Condition`] is the key of one observable fact. The value of that fact
//! lives in a [`WorldState`]; the registry owns one [`ConditionSource`] per
//! condition and uses them to bring a worldstate up to date with reality.
//!
//! # Example
//!
//! ```
//! use rgoap::{Condition, ConditionRegistry, FnSource, Value, WorldState};
//!
//! let mut registry = ConditionRegistry::new();
//! registry
//!     .add(Condition::new("door_open"), FnSource::new(|| Some(Value::Bool(false))))
//!     .unwrap();
//!
//! let mut worldstate = WorldState::new();
//! registry.initialize_worldstate(&mut worldstate);
//!
//! let door = registry.get("door_open").unwrap();
//! assert_eq!(
//!     worldstate.get_condition_value(&door).unwrap(),
//!     Some(&Value::Bool(false))
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::error::{GoapError, Result};
use crate::world_state::{Value, WorldState};

/// Identifying key for one observable fact about the world.
///
/// Cloning a condition is cheap; two conditions are the same fact iff their
/// names are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Condition {
    name: Arc<str>,
}

impl Condition {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition({})", self.name)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Condition {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Reads the live value of a condition.
///
/// Returning `None` means the value is currently unknown; the worldstate will
/// record the condition but hold no value for it.
pub trait ConditionSource: Send + Sync {
    fn value(&self) -> Option<Value>;
}

/// Helper for creating condition sources from closures.
pub struct FnSource<F> {
    func: F,
}

impl<F> FnSource<F>
where
    F: Fn() -> Option<Value> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ConditionSource for FnSource<F>
where
    F: Fn() -> Option<Value> + Send + Sync,
{
    fn value(&self) -> Option<Value> {
        (self.func)()
    }
}

struct Entry {
    condition: Condition,
    source: Arc<dyn ConditionSource>,
}

/// Every condition an agent knows about, together with its source.
///
/// One registry is built per agent and handed to whatever needs to refresh a
/// worldstate (the runner, or an executor created with
/// [`PlanExecutor::with_registry`](crate::PlanExecutor::with_registry)).
#[derive(Default)]
pub struct ConditionRegistry {
    entries: Vec<Entry>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a condition.
    ///
    /// # Errors
    ///
    /// Returns `GoapError::ConditionAlreadyRegistered` if a condition with the
    /// same name is already part of the registry.
    pub fn add<S>(&mut self, condition: Condition, source: S) -> Result<Condition>
    where
        S: ConditionSource + 'static,
    {
        if self.contains(condition.name()) {
            return Err(GoapError::ConditionAlreadyRegistered(
                condition.name().to_string(),
            ));
        }

        self.entries.push(Entry {
            condition: condition.clone(),
            source: Arc::new(source),
        });
        Ok(condition)
    }

    /// Looks up a registered condition by name.
    pub fn get(&self, name: &str) -> Result<Condition> {
        self.entries
            .iter()
            .find(|e| e.condition.name() == name)
            .map(|e| e.condition.clone())
            .ok_or_else(|| GoapError::UnknownCondition(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.condition.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.entries.iter().map(|e| &e.condition)
    }

    /// Writes the current value of every registered condition into
    /// `worldstate`.
    pub fn initialize_worldstate(&self, worldstate: &mut WorldState) {
        for entry in &self.entries {
            let value = entry.source.value();
            debug!("condition {} read as {:?}", entry.condition, value);
            match value {
                Some(value) => worldstate.memorize_condition_value(entry.condition.clone(), value),
                None => worldstate.mark_unknown(entry.condition.clone()),
            }
        }
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
