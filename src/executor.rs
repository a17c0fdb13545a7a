//! Forward execution of a solved plan.
//!
//! The executor starts at the plan's start node and follows the parent links
//! towards the goal node, running one action per step. Before each action
//! runs, its preconditions are checked against the *live* worldstate, so
//! drift between planning and reality aborts the plan instead of running an
//! action that no longer applies.

use log::{debug, error, info};

use crate::condition::ConditionRegistry;
use crate::error::{GoapError, Result};
use crate::introspection::Introspector;
use crate::planner::Plan;
use crate::world_state::WorldState;

/// Walks a plan forwards, all-or-nothing.
///
/// The first failing step aborts the whole execution; retrying or replanning
/// is left to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanExecutor<'r> {
    registry: Option<&'r ConditionRegistry>,
}

impl<'r> PlanExecutor<'r> {
    pub fn new() -> Self {
        Self { registry: None }
    }

    /// An executor that refreshes the live worldstate from `registry` before
    /// every step.
    pub fn with_registry(registry: &'r ConditionRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// Executes `plan` against `worldstate`.
    ///
    /// After each successful step the conditions the action produced are
    /// merged into `worldstate`: those named by
    /// [`Action::produced_conditions`](crate::action::Action::produced_conditions)
    /// and those `run` changed in the next node's worldstate. Nothing else
    /// from the planned states is copied, so every step is validated against
    /// live values.
    ///
    /// # Errors
    ///
    /// * `GoapError::PreconditionViolation` - an action's preconditions do not
    ///   hold in the live worldstate
    /// * `GoapError::InvalidActionContext` - an action's freeform context
    ///   failed
    /// * any error the action's `run` returns
    pub fn execute(&self, plan: &mut Plan, worldstate: &mut WorldState) -> Result<()> {
        self.run_chain(plan, worldstate, None)
    }

    /// Like [`execute`](Self::execute), publishing every node to
    /// `introspector` before its action runs.
    pub fn execute_with_introspector(
        &self,
        plan: &mut Plan,
        worldstate: &mut WorldState,
        introspector: &mut dyn Introspector,
    ) -> Result<()> {
        self.run_chain(plan, worldstate, Some(introspector))
    }

    fn run_chain(
        &self,
        plan: &mut Plan,
        worldstate: &mut WorldState,
        mut introspector: Option<&mut dyn Introspector>,
    ) -> Result<()> {
        let mut current = plan.start();

        loop {
            let node = plan.node(current);
            let (action, next) = match (node.action(), node.parent_node()) {
                (Some(action), Some(next)) => (action.clone(), next),
                _ => {
                    info!("Executor reached goal node, stopping execution");
                    return Ok(());
                }
            };

            if let Some(registry) = self.registry {
                registry.initialize_worldstate(worldstate);
            }

            if let Some(introspector) = introspector.as_deref_mut() {
                introspector.publish_update(plan.tree(), current);
            }

            if !action.is_valid(worldstate)? {
                error!(
                    "Action isn't valid to worldstate! Aborting executor. action: {}, worldstate: {}",
                    action.name(),
                    worldstate
                );
                return Err(GoapError::PreconditionViolation(action.name().to_string()));
            }

            if !action.check_freeform_context() {
                error!(
                    "Action's freeform context isn't valid! Aborting executor. action: {}",
                    action.name()
                );
                return Err(GoapError::InvalidActionContext(action.name().to_string()));
            }

            info!("PlanExecutor now executes: {}", action.name());
            let before = plan.node(next).worldstate().clone();
            action.run(plan.tree_mut().worldstate_mut(next))?;

            // regressed preconditions stay out of the live state
            let after = plan.node(next).worldstate();
            let mut produced = after.unsatisfied_conditions(&before);
            produced.extend(action.produced_conditions());
            let changes = after.restricted_to(&produced);
            debug!("{} produced: {}", action.name(), changes);
            worldstate.merge(&changes);

            current = next;
        }
    }
}
