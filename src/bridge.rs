//! Hands a solved plan over to a foreign state-machine framework.
//!
//! The framework is only known through the [`ForeignState`] capability: a
//! state executes against [`UserData`] and reports a [`StepOutcome`]. Actions
//! that wrap such a state implement [`ForeignStateAction`] and return
//! themselves from [`Action::as_foreign`]; every other action is run natively.
//!
//! [`plan_to_steps`] walks the plan exactly like the executor does and yields
//! one labelled step per action, which [`run_steps`] then drives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{error, info};

use crate::action::{Action, Effect, Precondition};
use crate::condition::Condition;
use crate::error::{GoapError, Result};
use crate::node::NodeId;
use crate::planner::Plan;
use crate::world_state::{Value, WorldState};

/// Key-value data passed between foreign states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserData {
    values: HashMap<String, Value>,
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Result of executing one foreign state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Aborted,
    Preempted,
}

/// A state of the foreign framework.
pub trait ForeignState: Send + Sync {
    fn execute(&self, userdata: &mut UserData) -> StepOutcome;
}

/// An action whose work is done by a foreign state.
pub trait ForeignStateAction {
    fn state(&self) -> &dyn ForeignState;

    /// Maps the state's userdata keys to the keys of the surrounding
    /// userdata.
    fn remapping(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    /// Makes worldstate data available to the state.
    fn translate_worldstate_to_userdata(&self, _next_worldstate: &WorldState, _userdata: &mut UserData) {}

    /// Makes the state's output available to the worldstate.
    fn translate_userdata_to_worldstate(&self, _userdata: &UserData, _next_worldstate: &mut WorldState) {}
}

/// Whether a step runs the action itself or delegates to its foreign state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Native,
    Foreign,
}

/// One action of a plan prepared for the foreign framework.
#[derive(Debug, Clone)]
pub struct Step {
    pub label: String,
    pub node: NodeId,
    pub next: NodeId,
    pub kind: StepKind,
}

/// Converts a plan into steps, skipping the goal node at the end.
pub fn plan_to_steps(plan: &Plan) -> Vec<Step> {
    let mut steps = Vec::with_capacity(plan.len());
    let mut current = plan.start();

    while let (Some(action), Some(next)) = (plan.node(current).action(), plan.node(current).parent_node()) {
        let kind = if action.as_foreign().is_some() {
            StepKind::Foreign
        } else {
            StepKind::Native
        };
        steps.push(Step {
            label: format!("{}_{}", action.name(), current),
            node: current,
            next,
            kind,
        });
        current = next;
    }

    steps
}

/// Runs `steps` of `plan` in order, stopping at the first failure.
///
/// Native steps check the freeform context and run the action. Foreign steps
/// hand `userdata` to the wrapped state; the freeform context is checked for
/// them as well.
pub fn run_steps(plan: &mut Plan, steps: &[Step], userdata: &mut UserData) -> Result<()> {
    for step in steps {
        let action = match plan.node(step.node).action() {
            Some(action) => action.clone(),
            None => continue,
        };

        if !action.check_freeform_context() {
            error!(
                "Action's freeform context isn't valid! Aborting wrapping state for {}",
                action.name()
            );
            return Err(GoapError::InvalidActionContext(action.name().to_string()));
        }

        info!("Running step {}", step.label);
        let next_worldstate = plan.tree_mut().worldstate_mut(step.next);
        match (step.kind, action.as_foreign()) {
            (StepKind::Foreign, Some(foreign)) => {
                run_foreign(foreign, next_worldstate, userdata, &step.label)?
            }
            _ => action.run(next_worldstate)?,
        }
    }
    Ok(())
}

fn run_foreign(
    foreign: &dyn ForeignStateAction,
    next_worldstate: &mut WorldState,
    userdata: &mut UserData,
    label: &str,
) -> Result<()> {
    foreign.translate_worldstate_to_userdata(next_worldstate, userdata);

    let remapping = foreign.remapping();
    let outcome = if remapping.is_empty() {
        foreign.state().execute(userdata)
    } else {
        let mut local = UserData::new();
        for (state_key, outer_key) in &remapping {
            if let Some(value) = userdata.get(outer_key) {
                local.set(state_key.clone(), value.clone());
            }
        }
        let outcome = foreign.state().execute(&mut local);
        for (state_key, outer_key) in &remapping {
            if let Some(value) = local.remove(state_key) {
                userdata.set(outer_key.clone(), value);
            }
        }
        outcome
    };

    match outcome {
        StepOutcome::Succeeded => {
            foreign.translate_userdata_to_worldstate(userdata, next_worldstate);
            Ok(())
        }
        StepOutcome::Aborted => Err(GoapError::Aborted(label.to_string())),
        StepOutcome::Preempted => Err(GoapError::Aborted(format!("{} preempted", label))),
    }
}

/// Makes a foreign state available to planning.
///
/// Worldstate conditions listed with [`with_input`](Self::with_input) are
/// copied into the userdata before the state runs; userdata keys listed with
/// [`with_output`](Self::with_output) are copied back afterwards.
pub struct StateWrapperAction {
    name: String,
    cost: f64,
    state: Arc<dyn ForeignState>,
    preconditions: Vec<Precondition>,
    effects: Vec<Effect>,
    remapping: HashMap<String, String>,
    inputs: Vec<(Condition, String)>,
    outputs: Vec<(String, Condition)>,
}

impl StateWrapperAction {
    /// # Errors
    ///
    /// Returns `GoapError::InvalidActionCost` if the cost is not positive.
    pub fn new(name: impl Into<String>, cost: f64, state: Arc<dyn ForeignState>) -> Result<Self> {
        if !(cost > 0.0) {
            return Err(GoapError::InvalidActionCost);
        }
        Ok(Self {
            name: name.into(),
            cost,
            state,
            preconditions: Vec::new(),
            effects: Vec::new(),
            remapping: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        })
    }

    pub fn with_precondition(mut self, condition: impl Into<Condition>, value: impl Into<Value>) -> Self {
        self.preconditions.push(Precondition::new(condition, value));
        self
    }

    pub fn with_effect(mut self, condition: impl Into<Condition>, value: impl Into<Value>) -> Self {
        self.effects.push(Effect::new(condition, value));
        self
    }

    pub fn with_remapping(mut self, state_key: impl Into<String>, outer_key: impl Into<String>) -> Self {
        self.remapping.insert(state_key.into(), outer_key.into());
        self
    }

    pub fn with_input(mut self, condition: impl Into<Condition>, key: impl Into<String>) -> Self {
        self.inputs.push((condition.into(), key.into()));
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.outputs.push((key.into(), condition.into()));
        self
    }
}

impl ForeignStateAction for StateWrapperAction {
    fn state(&self) -> &dyn ForeignState {
        self.state.as_ref()
    }

    fn remapping(&self) -> HashMap<String, String> {
        self.remapping.clone()
    }

    fn translate_worldstate_to_userdata(&self, next_worldstate: &WorldState, userdata: &mut UserData) {
        for (condition, key) in &self.inputs {
            if let Ok(Some(value)) = next_worldstate.get_condition_value(condition) {
                userdata.set(key.clone(), value.clone());
            }
        }
    }

    fn translate_userdata_to_worldstate(&self, userdata: &UserData, next_worldstate: &mut WorldState) {
        for (key, condition) in &self.outputs {
            if let Some(value) = userdata.get(key) {
                next_worldstate.memorize_condition_value(condition.clone(), value.clone());
            }
        }
    }
}

impl Action for StateWrapperAction {
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

    /// Runs the wrapped state directly, outside any foreign framework.
    fn run(&self, next_worldstate: &mut WorldState) -> Result<()> {
        let mut userdata = UserData::new();
        run_foreign(self, next_worldstate, &mut userdata, &self.name)
    }

    fn as_foreign(&self) -> Option<&dyn ForeignStateAction> {
        Some(self)
    }
}

impl fmt::Debug for StateWrapperAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateWrapperAction")
            .field("name", &self.name)
            .field("cost", &self.cost)
            .field("preconditions", &self.preconditions)
            .field("effects", &self.effects)
            .finish()
    }
}
