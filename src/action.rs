//! # Action Module for regressive GOAP
//!
//! Actions are the building blocks the planner composes into plans. Each
//! action has:
//!
//! * a cost the planner sums up along a plan
//! * [`Precondition`]s that must hold before it runs
//! * [`Effect`]s describing what holds after it ran
//! * a freeform context check, an arbitrary gate outside the condition system
//! * a `run` method performing the real side effect
//!
//! Because the planner searches backwards from the goal, an action also knows
//! how to *regress* a worldstate: [`Action::apply_preconditions`] turns the
//! state that should hold after the action into the state that has to hold
//! before it.
//!
//! ## Basic Usage
//!
//! ```
//! use rgoap::{Action, BasicAction, Condition, WorldState};
//!
//! let at_door = Condition::new("at_door");
//! let door = Condition::new("door");
//!
//! let open_door = BasicAction::new("open_door", 1.0)
//!     .unwrap()
//!     .with_precondition(at_door.clone(), true)
//!     .with_effect(door.clone(), "open");
//!
//! let mut state = WorldState::new();
//! state.memorize_condition_value(at_door, true);
//! state.memorize_condition_value(door.clone(), "closed");
//! assert!(open_door.is_valid(&state).unwrap());
//!
//! // Running the action records its effects in the worldstate it is given
//! open_door.run(&mut state).unwrap();
//! assert!(state.matches(&[(door, "open")].into_iter().collect()));
//! ```
//!
//! ## Custom Actions
//!
//! Anything implementing [`Action`] can be planned with. Only `name`,
//! `preconditions`, `effects` and `run` have to be provided:
//!
//! ```
//! use rgoap::{Action, Condition, Effect, Precondition, Result, WorldState};
//!
//! #[derive(Debug)]
//! struct ChargeBattery {
//!     preconditions: Vec<Precondition>,
//!     effects: Vec<Effect>,
//! }
//!
//! impl Action for ChargeBattery {
//!     fn name(&self) -> &str {
//!         "charge_battery"
//!     }
//!
//!     fn cost(&self) -> f64 {
//!         4.0
//!     }
//!
//!     fn preconditions(&self) -> &[Precondition] {
//!         &self.preconditions
//!     }
//!
//!     fn effects(&self) -> &[Effect] {
//!         &self.effects
//!     }
//!
//!     fn run(&self, next_worldstate: &mut WorldState) -> Result<()> {
//!         // talk to the charger here
//!         for effect in &self.effects {
//!             effect.apply_to(next_worldstate);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let charge = ChargeBattery {
//!     preconditions: vec![Precondition::new(Condition::new("at_dock"), true)],
//!     effects: vec![Effect::new(Condition::new("battery_full"), true)],
//! };
//! assert_eq!(charge.cost(), 4.0);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::bridge::ForeignStateAction;
use crate::condition::Condition;
use crate::error::{GoapError, Result};
use crate::world_state::{Value, WorldState};

/// A condition value that must hold for an action or goal.
///
/// With a deviation, numeric values within `deviation` of the expected value
/// count as valid too.
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    condition: Condition,
    value: Value,
    deviation: Option<f64>,
}

impl Precondition {
    pub fn new(condition: impl Into<Condition>, value: impl Into<Value>) -> Self {
        Self {
            condition: condition.into(),
            value: value.into(),
            deviation: None,
        }
    }

    pub fn with_deviation(mut self, deviation: f64) -> Self {
        self.deviation = Some(deviation.abs());
        self
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn deviation(&self) -> Option<f64> {
        self.deviation
    }

    /// Checks this precondition against `worldstate`.
    ///
    /// An unknown value never satisfies a precondition.
    ///
    /// # Errors
    ///
    /// Returns `GoapError::MissingConditionValue` if the worldstate never
    /// recorded the condition.
    pub fn is_valid(&self, worldstate: &WorldState) -> Result<bool> {
        let current = match worldstate.get_condition_value(&self.condition)? {
            Some(current) => current,
            None => return Ok(false),
        };

        match (self.deviation, current.as_f64(), self.value.as_f64()) {
            (Some(deviation), Some(current), Some(expected)) => {
                Ok((current - expected).abs() <= deviation)
            }
            _ => Ok(*current == self.value),
        }
    }

    /// Records the expected value in `worldstate`. The deviation is not
    /// carried over.
    pub fn apply(&self, worldstate: &mut WorldState) {
        worldstate.memorize_condition_value(self.condition.clone(), self.value.clone());
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.deviation {
            Some(deviation) => write!(f, "{} ~ {} (+-{})", self.condition, self.value, deviation),
            None => write!(f, "{} = {}", self.condition, self.value),
        }
    }
}

/// A condition value an action establishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    condition: Condition,
    value: Value,
}

impl Effect {
    pub fn new(condition: impl Into<Condition>, value: impl Into<Value>) -> Self {
        Self {
            condition: condition.into(),
            value: value.into(),
        }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn apply_to(&self, worldstate: &mut WorldState) {
        worldstate.memorize_condition_value(self.condition.clone(), self.value.clone());
    }

    /// Whether `worldstate` records exactly the value this effect produces.
    pub fn matches_condition(&self, worldstate: &WorldState) -> bool {
        matches!(worldstate.get_condition_value(&self.condition), Ok(Some(v)) if *v == self.value)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.condition, self.value)
    }
}

/// An entry of the action catalog.
///
/// The planner and executor only ever talk to actions through this trait, so
/// any type can take part in planning. The provided methods implement plain
/// "set condition to value" semantics; actions with variable effects override
/// [`has_satisfying_effects`](Action::has_satisfying_effects) and
/// [`apply_preconditions`](Action::apply_preconditions).
pub trait Action: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Fixed scalar cost of running this action.
    fn cost(&self) -> f64 {
        1.0
    }

    fn preconditions(&self) -> &[Precondition];

    fn effects(&self) -> &[Effect];

    /// Conditions running this action sets, carried over into the live
    /// worldstate by the executor.
    fn produced_conditions(&self) -> Vec<Condition> {
        self.effects().iter().map(|effect| effect.condition().clone()).collect()
    }

    /// Arbitrary external gate. Checked when the planner filters the catalog
    /// and again right before the executor runs the action.
    fn check_freeform_context(&self) -> bool {
        true
    }

    /// Whether all preconditions hold in `worldstate`.
    fn is_valid(&self, worldstate: &WorldState) -> Result<bool> {
        for precondition in self.preconditions() {
            if !precondition.is_valid(worldstate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether at least one effect could reduce one of the `unsatisfied`
    /// conditions of `worldstate` relative to `start_worldstate`.
    fn has_satisfying_effects(
        &self,
        worldstate: &WorldState,
        _start_worldstate: &WorldState,
        unsatisfied: &HashSet<Condition>,
    ) -> bool {
        self.effects()
            .iter()
            .any(|effect| unsatisfied.contains(effect.condition()) && effect.matches_condition(worldstate))
    }

    /// Regresses `worldstate` over this action.
    ///
    /// Conditions the effects establish no longer need to hold beforehand and
    /// are reset to their start value; then every precondition is recorded.
    ///
    /// # Errors
    ///
    /// Returns `GoapError::MissingConditionValue` if the start worldstate
    /// never recorded a condition this action affects.
    fn apply_preconditions(
        &self,
        worldstate: &mut WorldState,
        start_worldstate: &WorldState,
    ) -> Result<()> {
        for effect in self.effects() {
            let condition = effect.condition();
            if !worldstate.contains(condition) {
                continue;
            }
            match start_worldstate.get_condition_value(condition)? {
                Some(value) => worldstate.memorize_condition_value(condition.clone(), value.clone()),
                None => worldstate.mark_unknown(condition.clone()),
            }
        }
        for precondition in self.preconditions() {
            precondition.apply(worldstate);
        }
        Ok(())
    }

    /// Performs the real side effect. `next_worldstate` is the state the plan
    /// expects afterwards and should be updated with what actually happened.
    fn run(&self, next_worldstate: &mut WorldState) -> Result<()>;

    /// Actions wrapping a foreign state machine state return themselves here.
    fn as_foreign(&self) -> Option<&dyn ForeignStateAction> {
        None
    }
}

type ContextFn = Box<dyn Fn() -> bool + Send + Sync>;
type RunFn = Box<dyn Fn(&mut WorldState) -> Result<()> + Send + Sync>;

/// A general purpose action built from preconditions, effects and optional
/// closures for the freeform context and the side effect.
///
/// # Examples
///
/// ```
/// use rgoap::{Action, BasicAction, GoapError};
///
/// let action = BasicAction::new("walk_to_door", 1.0).unwrap();
/// assert_eq!(action.name(), "walk_to_door");
///
/// // Costs must be positive
/// assert!(matches!(
///     BasicAction::new("invalid", 0.0),
///     Err(GoapError::InvalidActionCost)
/// ));
/// ```
pub struct BasicAction {
    name: String,
    cost: f64,
    preconditions: Vec<Precondition>,
    effects: Vec<Effect>,
    context: Option<ContextFn>,
    run: Option<RunFn>,
}

impl BasicAction {
    /// Creates a new action with the specified name and cost.
    ///
    /// # Errors
    ///
    /// Returns `GoapError::InvalidActionCost` if the cost is zero, negative or
    /// not a number.
    pub fn new(name: impl Into<String>, cost: f64) -> Result<Self> {
        if !(cost > 0.0) {
            return Err(GoapError::InvalidActionCost);
        }

        Ok(Self {
            name: name.into(),
            cost,
            preconditions: Vec::new(),
            effects: Vec::new(),
            context: None,
            run: None,
        })
    }

    pub fn with_precondition(
        mut self,
        condition: impl Into<Condition>,
        value: impl Into<Value>,
    ) -> Self {
        self.preconditions.push(Precondition::new(condition, value));
        self
    }

    /// Adds a numeric precondition that also accepts values within
    /// `deviation`.
    pub fn with_precondition_within(
        mut self,
        condition: impl Into<Condition>,
        value: impl Into<Value>,
        deviation: f64,
    ) -> Self {
        self.preconditions
            .push(Precondition::new(condition, value).with_deviation(deviation));
        self
    }

    pub fn with_effect(mut self, condition: impl Into<Condition>, value: impl Into<Value>) -> Self {
        self.effects.push(Effect::new(condition, value));
        self
    }

    /// Gates the action behind `context`.
    pub fn with_context<F>(mut self, context: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.context = Some(Box::new(context));
        self
    }

    /// Side effect to perform when the action runs. It receives the next
    /// worldstate after the effects have been recorded in it.
    pub fn with_run<F>(mut self, run: F) -> Self
    where
        F: Fn(&mut WorldState) -> Result<()> + Send + Sync + 'static,
    {
        self.run = Some(Box::new(run));
        self
    }
}

impl Action for BasicAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    fn effects(&self) -> &[Effect] {
        &self.effects
    }

    fn check_freeform_context(&self) -> bool {
        self.context.as_ref().map_or(true, |context| context())
    }

    fn run(&self, next_worldstate: &mut WorldState) -> Result<()> {
        for effect in &self.effects {
            effect.apply_to(next_worldstate);
        }
        match &self.run {
            Some(run) => run(next_worldstate),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for BasicAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAction")
            .field("name", &self.name)
            .field("cost", &self.cost)
            .field("preconditions", &self.preconditions)
            .field("effects", &self.effects)
            .finish()
    }
}

impl fmt::Display for BasicAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Ordered action catalog handed to the planner.
#[derive(Debug, Clone, Default)]
pub struct ActionBag {
    actions: Vec<Arc<dyn Action>>,
}

impl ActionBag {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    pub fn add<A: Action + 'static>(&mut self, action: A) {
        self.actions.push(Arc::new(action));
    }

    pub fn add_shared(&mut self, action: Arc<dyn Action>) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Action>> {
        self.actions.iter()
    }
}

impl From<ActionBag> for Vec<Arc<dyn Action>> {
    fn from(bag: ActionBag) -> Self {
        bag.actions
    }
}

impl fmt::Display for ActionBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.actions.iter().map(|a| a.name()).collect();
        write!(f, "{:?}", names)
    }
}
