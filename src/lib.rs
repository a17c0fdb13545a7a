//! # rgoap
//!
//! A regressive Goal-Oriented Action Planning (GOAP) library.
//!
//! Given the current [`WorldState`], a [`Goal`] and a catalog of [`Action`]s,
//! the [`Planner`] searches backwards from the goal for an action sequence
//! that reaches it, and the [`PlanExecutor`] runs that sequence forwards while
//! revalidating every step against the live worldstate. The [`Runner`] wraps
//! both into a control loop with retries, goal ranking and preemption.

mod action;
mod bridge;
mod condition;
mod error;
mod executor;
mod goal;
mod introspection;
mod memory;
mod node;
mod planner;
mod runner;
mod world_state;

pub use action::{Action, ActionBag, BasicAction, Effect, Precondition};
pub use bridge::{
    plan_to_steps, run_steps, ForeignState, ForeignStateAction, StateWrapperAction, Step,
    StepKind, StepOutcome, UserData,
};
pub use condition::{Condition, ConditionRegistry, ConditionSource, FnSource};
pub use error::{GoapError, Result};
pub use executor::PlanExecutor;
pub use goal::Goal;
pub use introspection::{Introspector, PlanVisualizer};
pub use memory::{Memory, MemoryChangeVarAction, MemoryCondition, MemoryIncrementerAction};
pub use node::{Node, NodeId, SearchTree};
pub use planner::{Plan, Planner, PlannerConfig};
pub use runner::{Outcome, PreemptHandle, Runner, RunnerConfig};
pub use world_state::{Value, WorldState};
