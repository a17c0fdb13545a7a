//! Control loop around planner and executor.
//!
//! The [`Runner`] keeps the agent's worldstate in sync with reality through
//! its [`ConditionRegistry`], plans for one or several goals, executes the
//! plans and replans when execution aborts. Preemption is cooperative: a
//! [`PreemptHandle`] can be requested from any thread and is polled between
//! planning attempts and executions, never in the middle of either.
//!
//! ```
//! use std::sync::Arc;
//! use rgoap::{
//!     Action, ConditionRegistry, Goal, Memory, MemoryCondition, MemoryIncrementerAction,
//!     Outcome, Precondition, Runner,
//! };
//!
//! let memory = Memory::new();
//! memory.set_value("counter", 0);
//!
//! let source = MemoryCondition::new(memory.clone(), "counter");
//! let mut registry = ConditionRegistry::new();
//! let counter = registry.add(source.condition(), source).unwrap();
//!
//! let actions: Vec<Arc<dyn Action>> =
//!     vec![Arc::new(MemoryIncrementerAction::new(memory.clone(), "counter"))];
//! let mut runner = Runner::new(registry, actions);
//!
//! let goal = Goal::new("count_to_three", vec![Precondition::new(counter, 3)]);
//! assert_eq!(runner.update_and_plan_and_execute(&goal), Outcome::Succeeded);
//! assert_eq!(memory.get_value("counter"), Some(3.into()));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};

use crate::action::Action;
use crate::condition::{Condition, ConditionRegistry};
use crate::error::Result;
use crate::executor::PlanExecutor;
use crate::goal::Goal;
use crate::introspection::Introspector;
use crate::planner::{Plan, Planner, PlannerConfig};
use crate::world_state::WorldState;

/// Runner settings.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Planning attempts per [`Runner::update_and_plan`] call, at least 1.
    pub tries: usize,
    /// Replans after an aborted execution before giving up.
    pub max_replans: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tries: 1,
            max_replans: 3,
        }
    }
}

/// How a runner invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Aborted,
    Preempted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "succeeded"),
            Outcome::Aborted => write!(f, "aborted"),
            Outcome::Preempted => write!(f, "preempted"),
        }
    }
}

/// Cloneable flag requesting a runner to stop at its next check.
#[derive(Debug, Clone, Default)]
pub struct PreemptHandle {
    requested: Arc<AtomicBool>,
}

impl PreemptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Clears the request, returning whether one was pending.
    pub fn service(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

/// Drives planning and execution for one agent.
#[derive(Debug)]
pub struct Runner {
    registry: ConditionRegistry,
    worldstate: WorldState,
    planner: Planner,
    config: RunnerConfig,
    last_goal: Option<String>,
    preempt: PreemptHandle,
}

impl Runner {
    pub fn new(registry: ConditionRegistry, actions: impl Into<Vec<Arc<dyn Action>>>) -> Self {
        Self {
            registry,
            worldstate: WorldState::new(),
            planner: Planner::new(actions),
            config: RunnerConfig::default(),
            last_goal: None,
            preempt: PreemptHandle::new(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = RunnerConfig {
            tries: config.tries.max(1),
            ..config
        };
        self
    }

    pub fn with_planner_config(mut self, config: PlannerConfig) -> Self {
        self.planner = self.planner.with_config(config);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn worldstate(&self) -> &WorldState {
        &self.worldstate
    }

    pub fn registry(&self) -> &ConditionRegistry {
        &self.registry
    }

    /// A handle to preempt this runner, usable from other threads.
    pub fn preempt_handle(&self) -> PreemptHandle {
        self.preempt.clone()
    }

    /// Updates the worldstate to reality.
    pub fn update_worldstate(&mut self) {
        self.registry.initialize_worldstate(&mut self.worldstate);
        info!("worldstate initialized/updated to: {}", self.worldstate);
    }

    /// Conditions still unknown in the worldstate, each logged as a warning.
    pub fn check_conditions(&self) -> Vec<Condition> {
        let unknown = self.worldstate.unknown_conditions();
        for condition in &unknown {
            warn!("Condition still unknown: {}", condition);
        }
        unknown
    }

    /// Plans for `goal` from the current worldstate without refreshing it.
    pub fn plan(&self, goal: &Goal) -> Result<Plan> {
        self.check_conditions();
        self.planner.plan(&self.worldstate, goal)
    }

    /// Updates the worldstate and plans, up to `tries` times until a plan is
    /// found.
    pub fn update_and_plan(&mut self, goal: &Goal) -> Result<Plan> {
        let mut tries = self.config.tries;
        loop {
            tries -= 1;
            self.update_worldstate();
            match self.plan(goal) {
                Ok(plan) => return Ok(plan),
                Err(e) if tries == 0 => return Err(e),
                Err(_) => warn!("Runner retrying in update_and_plan"),
            }
        }
    }

    /// Executes `plan`, refreshing the worldstate from the registry before
    /// every step.
    pub fn execute(&mut self, plan: &mut Plan) -> Result<()> {
        PlanExecutor::with_registry(&self.registry).execute(plan, &mut self.worldstate)
    }

    pub fn execute_with_introspector(
        &mut self,
        plan: &mut Plan,
        introspector: &mut dyn Introspector,
    ) -> Result<()> {
        PlanExecutor::with_registry(&self.registry).execute_with_introspector(
            plan,
            &mut self.worldstate,
            introspector,
        )
    }

    /// Updates, plans and executes until `goal` is reached, replanning after
    /// an aborted execution.
    pub fn update_and_plan_and_execute(&mut self, goal: &Goal) -> Outcome {
        let mut replans = 0;
        loop {
            if self.preempt.service() {
                info!("Runner preempted");
                return Outcome::Preempted;
            }

            let mut plan = match self.update_and_plan(goal) {
                Ok(plan) => plan,
                Err(e) => {
                    error!("RGOAP Runner aborts, no plan found! {}", e);
                    return Outcome::Aborted;
                }
            };

            match self.execute(&mut plan) {
                Ok(()) => return Outcome::Succeeded,
                Err(e) => warn!("RGOAP Runner execution fails ({}), replanning..", e),
            }

            self.update_worldstate();
            match goal.is_valid(&self.worldstate) {
                Ok(true) => error!("Though goal is valid in current worldstate, the plan execution failed!?"),
                _ => warn!("Goal isn't valid in current worldstate"),
            }

            replans += 1;
            if replans > self.config.max_replans {
                error!("RGOAP Runner gives up after {} replans", self.config.max_replans);
                return Outcome::Aborted;
            }
        }
    }

    /// Tries `goals` by descending usability until one is planned for and
    /// executed successfully. The goal executed by the previous call is
    /// skipped; goals are identified by name.
    pub fn plan_and_execute_goals(&mut self, goals: &[Goal]) -> Outcome {
        self.update_worldstate();

        let mut ranked: Vec<&Goal> = goals.iter().collect();
        ranked.sort_by(|a, b| b.usability().total_cmp(&a.usability()));
        info!(
            "Available goals: {:?}",
            ranked.iter().map(|g| g.to_string()).collect::<Vec<_>>()
        );

        for goal in ranked {
            if self.last_goal.as_deref() == Some(goal.name()) {
                continue;
            }

            if self.preempt.service() {
                info!("Runner preempted");
                return Outcome::Preempted;
            }

            let mut plan = match self.plan(goal) {
                Ok(plan) => plan,
                Err(_) => continue,
            };

            self.last_goal = Some(goal.name().to_string());
            info!("Executing most usable goal: {}", goal);
            info!(
                "With plan: {:?}",
                plan.actions().iter().map(|a| a.name().to_string()).collect::<Vec<_>>()
            );
            match self.execute(&mut plan) {
                Ok(()) => {
                    info!("Most usable goal returned: {}", Outcome::Succeeded);
                    return Outcome::Succeeded;
                }
                Err(e) => warn!("Executed goal aborted ({}), trying next goal", e),
            }
        }

        error!("For no goal a plan could be found!");
        Outcome::Aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::action::{BasicAction, Precondition};
    use crate::condition::FnSource;
    use crate::error::GoapError;
    use crate::memory::{Memory, MemoryChangeVarAction, MemoryCondition};
    use crate::world_state::Value;

    fn counter_registry(memory: &Memory) -> (ConditionRegistry, Condition) {
        let source = MemoryCondition::new(memory.clone(), "counter");
        let mut registry = ConditionRegistry::new();
        let counter = registry.add(source.condition(), source).unwrap();
        (registry, counter)
    }

    #[test]
    fn test_config_clamps_tries() {
        let runner = Runner::new(ConditionRegistry::new(), Vec::<Arc<dyn Action>>::new()).with_config(
            RunnerConfig {
                tries: 0,
                max_replans: 1,
            },
        );
        assert_eq!(runner.config().tries, 1);
        assert_eq!(runner.config().max_replans, 1);
    }

    #[test]
    fn test_check_conditions_reports_unknown() {
        let mut registry = ConditionRegistry::new();
        registry
            .add(Condition::new("battery"), FnSource::new(|| None))
            .unwrap();
        let mut runner = Runner::new(registry, Vec::<Arc<dyn Action>>::new());
        runner.update_worldstate();
        assert_eq!(runner.check_conditions(), vec![Condition::new("battery")]);
    }

    #[test]
    fn test_update_and_plan_retries() {
        let memory = Memory::new();
        let (registry, counter) = counter_registry(&memory);
        let action: Arc<dyn Action> = Arc::new(MemoryChangeVarAction::new(memory.clone(), "counter", 1, 2));
        let mut runner = Runner::new(registry, vec![action]).with_config(RunnerConfig {
            tries: 3,
            max_replans: 0,
        });

        memory.set_value("counter", 0);
        let goal = Goal::new("two", vec![Precondition::new(counter, 2)]);
        assert!(matches!(runner.update_and_plan(&goal), Err(GoapError::PlanNotFound)));

        memory.set_value("counter", 1);
        assert_eq!(runner.update_and_plan(&goal).unwrap().len(), 1);
    }

    #[test]
    fn test_replans_after_failed_execution() {
        let memory = Memory::new();
        memory.set_value("counter", 0);
        let (registry, counter) = counter_registry(&memory);

        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let writer = memory.clone();
        let flaky: Arc<dyn Action> = Arc::new(
            BasicAction::new("flaky_set", 1.0)
                .unwrap()
                .with_precondition(counter.clone(), 0)
                .with_effect(counter.clone(), 1)
                .with_run(move |_| {
                    if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(GoapError::ActionFailed("flaky_set".to_string()));
                    }
                    writer.set_value("counter", 1);
                    Ok(())
                }),
        );

        let mut runner = Runner::new(registry, vec![flaky]);
        let goal = Goal::new("one", vec![Precondition::new(counter, 1)]);

        assert_eq!(runner.update_and_plan_and_execute(&goal), Outcome::Succeeded);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(memory.get_value("counter"), Some(Value::Int(1)));
    }

    #[test]
    fn test_gives_up_after_max_replans() {
        let memory = Memory::new();
        memory.set_value("counter", 0);
        let (registry, counter) = counter_registry(&memory);
        let broken: Arc<dyn Action> = Arc::new(
            BasicAction::new("broken", 1.0)
                .unwrap()
                .with_precondition(counter.clone(), 0)
                .with_effect(counter.clone(), 1)
                .with_run(|_| Err(GoapError::ActionFailed("broken".to_string()))),
        );

        let mut runner = Runner::new(registry, vec![broken]).with_config(RunnerConfig {
            tries: 1,
            max_replans: 2,
        });
        let goal = Goal::new("one", vec![Precondition::new(counter, 1)]);
        assert_eq!(runner.update_and_plan_and_execute(&goal), Outcome::Aborted);
    }

    #[test]
    fn test_preempt_before_planning() {
        let memory = Memory::new();
        memory.set_value("counter", 0);
        let (registry, counter) = counter_registry(&memory);
        let mut runner = Runner::new(registry, Vec::<Arc<dyn Action>>::new());

        let handle = runner.preempt_handle();
        handle.request();
        assert!(handle.is_requested());

        let goal = Goal::new("one", vec![Precondition::new(counter, 1)]);
        assert_eq!(runner.update_and_plan_and_execute(&goal), Outcome::Preempted);
        // the request is consumed
        assert!(!handle.is_requested());
    }

    #[test]
    fn test_plan_and_execute_goals_ranks_and_skips_last() {
        let memory = Memory::new();
        memory.set_value("counter", 0);
        let (registry, counter) = counter_registry(&memory);
        let actions: Vec<Arc<dyn Action>> = vec![
            Arc::new(MemoryChangeVarAction::new(memory.clone(), "counter", 0, 1)),
            Arc::new(MemoryChangeVarAction::new(memory.clone(), "counter", 1, 0)),
        ];
        let mut runner = Runner::new(registry, actions);

        let goals = vec![
            Goal::new("unreachable", vec![Precondition::new(counter.clone(), 7)]).with_usability(0.9),
            Goal::new("one", vec![Precondition::new(counter.clone(), 1)]).with_usability(0.5),
            Goal::new("zero", vec![Precondition::new(counter, 0)]).with_usability(0.1),
        ];

        assert_eq!(runner.plan_and_execute_goals(&goals), Outcome::Succeeded);
        assert_eq!(memory.get_value("counter"), Some(Value::Int(1)));

        // "one" ran last time, so "zero" is next in line
        assert_eq!(runner.plan_and_execute_goals(&goals), Outcome::Succeeded);
        assert_eq!(memory.get_value("counter"), Some(Value::Int(0)));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Succeeded.to_string(), "succeeded");
        assert_eq!(Outcome::Aborted.to_string(), "aborted");
        assert_eq!(Outcome::Preempted.to_string(), "preempted");
    }
}
