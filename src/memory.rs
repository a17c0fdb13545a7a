//! Agent memory: named variables that conditions can read and actions can
//! write.
//!
//! Memory is the simplest world an agent can act on, which makes it handy for
//! exercising the planner without any hardware behind the conditions.
//!
//! ```
//! use rgoap::{ConditionRegistry, Memory, MemoryCondition, WorldState};
//!
//! let memory = Memory::new();
//! memory.set_value("counter", 0);
//!
//! let source = MemoryCondition::new(memory.clone(), "counter");
//! let mut registry = ConditionRegistry::new();
//! let counter = registry.add(source.condition(), source).unwrap();
//! assert_eq!(counter.name(), "memory.counter");
//!
//! let mut worldstate = WorldState::new();
//! registry.initialize_worldstate(&mut worldstate);
//! assert!(worldstate.contains(&counter));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::action::{Action, Effect, Precondition};
use crate::condition::{Condition, ConditionSource};
use crate::error::{GoapError, Result};
use crate::world_state::{Value, WorldState};

/// Shared variable store. Clones refer to the same variables.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    variables: Arc<Mutex<HashMap<String, Value>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&self, variable: &str, value: impl Into<Value>) {
        let value = value.into();
        debug!("memory.{} := {}", variable, value);
        self.lock().insert(variable.to_string(), value);
    }

    pub fn get_value(&self, variable: &str) -> Option<Value> {
        self.lock().get(variable).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.variables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn memory_condition(variable: &str) -> Condition {
    Condition::new(format!("memory.{}", variable))
}

/// Condition source reading one memory variable.
#[derive(Debug, Clone)]
pub struct MemoryCondition {
    memory: Memory,
    variable: String,
}

impl MemoryCondition {
    pub fn new(memory: Memory, variable: impl Into<String>) -> Self {
        Self {
            memory,
            variable: variable.into(),
        }
    }

    /// The condition this source feeds, named `memory.<variable>`.
    pub fn condition(&self) -> Condition {
        memory_condition(&self.variable)
    }
}

impl ConditionSource for MemoryCondition {
    fn value(&self) -> Option<Value> {
        self.memory.get_value(&self.variable)
    }
}

/// Sets a memory variable from one fixed value to another.
#[derive(Debug)]
pub struct MemoryChangeVarAction {
    name: String,
    memory: Memory,
    variable: String,
    preconditions: Vec<Precondition>,
    effects: Vec<Effect>,
}

impl MemoryChangeVarAction {
    pub fn new(
        memory: Memory,
        variable: impl Into<String>,
        old_value: impl Into<Value>,
        new_value: impl Into<Value>,
    ) -> Self {
        let variable = variable.into();
        let condition = memory_condition(&variable);
        let old_value = old_value.into();
        let new_value = new_value.into();
        Self {
            name: format!("change_{}_{}_to_{}", variable, old_value, new_value),
            memory,
            preconditions: vec![Precondition::new(condition.clone(), old_value)],
            effects: vec![Effect::new(condition, new_value)],
            variable,
        }
    }
}

impl Action for MemoryChangeVarAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    fn effects(&self) -> &[Effect] {
        &self.effects
    }

    fn run(&self, next_worldstate: &mut WorldState) -> Result<()> {
        for effect in &self.effects {
            self.memory.set_value(&self.variable, effect.value().clone());
            effect.apply_to(next_worldstate);
        }
        Ok(())
    }
}

/// Adds a fixed increment to a numeric memory variable.
///
/// The effect is variable: the action can produce any value lying from the
/// start value in the increment's direction, so the planner chains it as
/// often as needed.
#[derive(Debug)]
pub struct MemoryIncrementerAction {
    name: String,
    memory: Memory,
    variable: String,
    condition: Condition,
    increment: i64,
}

impl MemoryIncrementerAction {
    /// An incrementer adding one.
    pub fn new(memory: Memory, variable: impl Into<String>) -> Self {
        Self::with_increment(memory, variable, 1)
    }

    pub fn with_increment(memory: Memory, variable: impl Into<String>, increment: i64) -> Self {
        let variable = variable.into();
        Self {
            name: format!("increment_{}_by_{}", variable, increment),
            condition: memory_condition(&variable),
            memory,
            variable,
            increment,
        }
    }

    pub fn increment(&self) -> i64 {
        self.increment
    }

    /// `value` moved by `delta`; `None` for non-numeric values and integer
    /// overflow.
    fn offset(value: &Value, delta: i64) -> Option<Value> {
        match value {
            Value::Int(v) => v.checked_add(delta).map(Value::Int),
            Value::Float(v) => Some(Value::Float(v + delta as f64)),
            _ => None,
        }
    }
}

impl Action for MemoryIncrementerAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn preconditions(&self) -> &[Precondition] {
        &[]
    }

    fn effects(&self) -> &[Effect] {
        &[]
    }

    fn produced_conditions(&self) -> Vec<Condition> {
        vec![self.condition.clone()]
    }

    fn has_satisfying_effects(
        &self,
        worldstate: &WorldState,
        start_worldstate: &WorldState,
        unsatisfied: &HashSet<Condition>,
    ) -> bool {
        if !unsatisfied.contains(&self.condition) {
            return false;
        }
        let node = worldstate.get_condition_value(&self.condition).ok().flatten();
        let start = start_worldstate.get_condition_value(&self.condition).ok().flatten();
        match (node.and_then(Value::as_f64), start.and_then(Value::as_f64)) {
            (Some(node), Some(start)) => (node - start) * self.increment as f64 > 0.0,
            _ => false,
        }
    }

    fn apply_preconditions(
        &self,
        worldstate: &mut WorldState,
        _start_worldstate: &WorldState,
    ) -> Result<()> {
        let regressed = worldstate
            .get_condition_value(&self.condition)?
            .and_then(|value| Self::offset(value, self.increment.checked_neg()?))
            .ok_or_else(|| GoapError::MissingConditionValue(self.condition.name().to_string()))?;
        worldstate.memorize_condition_value(self.condition.clone(), regressed);
        Ok(())
    }

    fn run(&self, next_worldstate: &mut WorldState) -> Result<()> {
        let current = self
            .memory
            .get_value(&self.variable)
            .ok_or_else(|| GoapError::ActionFailed(format!("memory.{} is not set", self.variable)))?;
        let updated = Self::offset(&current, self.increment).ok_or_else(|| {
            GoapError::ActionFailed(format!(
                "memory.{} cannot be incremented by {}: {}",
                self.variable, self.increment, current
            ))
        })?;

        self.memory.set_value(&self.variable, updated.clone());
        next_worldstate.memorize_condition_value(self.condition.clone(), updated);
        Ok(())
    }
}
