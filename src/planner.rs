//! # Planner Module for regressive GOAP
//!
//! The planner searches backwards: it starts from the goal worldstate and
//! asks which actions could have produced it, regressing the state over each
//! of them until it reaches a state the real start worldstate matches. That
//! node is the first step of the plan; following its parent links executes
//! the plan forwards.
//!
//! ## Search
//!
//! 1. The goal's preconditions form the goal node.
//! 2. Actions whose freeform context fails are dropped for the whole run.
//! 3. The open node with the lowest total cost (path cost plus heuristic) is
//!    taken next; ties go to the node discovered first.
//! 4. If the start worldstate matches it, the search is done.
//! 5. Otherwise it is expanded over the actions whose effects could reduce one
//!    of its unsatisfied conditions.
//!
//! There is no closed list, so the same worldstate can be expanded more than
//! once through different paths. The iteration ceiling in [`PlannerConfig`]
//! bounds the search on cyclic action graphs.
//!
//! ## Basic Usage
//!
//! ```
//! use std::sync::Arc;
//! use rgoap::{Action, BasicAction, Condition, Goal, Planner, Precondition, WorldState};
//!
//! let door = Condition::new("door");
//! let at_door = Condition::new("at_door");
//!
//! let walk: Arc<dyn Action> = Arc::new(
//!     BasicAction::new("walk_to_door", 1.0)
//!         .unwrap()
//!         .with_effect(at_door.clone(), true),
//! );
//! let open: Arc<dyn Action> = Arc::new(
//!     BasicAction::new("open_door", 1.0)
//!         .unwrap()
//!         .with_precondition(at_door.clone(), true)
//!         .with_effect(door.clone(), "open"),
//! );
//!
//! let mut start = WorldState::new();
//! start.memorize_condition_value(door.clone(), "closed");
//! start.memorize_condition_value(at_door, false);
//!
//! let goal = Goal::new("door_open", vec![Precondition::new(door, "open")]);
//!
//! let planner = Planner::new(vec![walk, open]);
//! let plan = planner.plan(&start, &goal).unwrap();
//!
//! let names: Vec<_> = plan.actions().iter().map(|a| a.name().to_string()).collect();
//! assert_eq!(names, ["walk_to_door", "open_door"]);
//! assert_eq!(plan.path_cost(), 2.0);
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::action::Action;
use crate::error::{GoapError, Result};
use crate::goal::Goal;
use crate::node::{Node, NodeId, SearchTree};
use crate::world_state::WorldState;

/// Planner settings.
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    /// Number of nodes the search may consider before giving up.
    pub max_iterations: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
        }
    }
}

/// Open collection entry. Ordered by total cost, then by insertion sequence,
/// which reproduces a stable sort of all open nodes by total cost.
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    total_cost: f64,
    seq: u64,
    id: NodeId,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_cost
            .total_cmp(&other.total_cost)
            .then(self.seq.cmp(&other.seq))
    }
}

#[derive(Default)]
struct OpenCollection {
    heap: BinaryHeap<Reverse<OpenNode>>,
    seq: u64,
}

impl OpenCollection {
    fn push(&mut self, id: NodeId, node: &Node) {
        self.heap.push(Reverse(OpenNode {
            total_cost: node.total_cost(),
            seq: self.seq,
            id,
        }));
        self.seq += 1;
    }

    fn pop(&mut self) -> Option<NodeId> {
        self.heap.pop().map(|Reverse(open)| open.id)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

/// A solved plan.
///
/// Owns every node of the search so that the chain can be executed and the
/// whole planning net inspected afterwards.
#[derive(Debug)]
pub struct Plan {
    tree: SearchTree,
    start: NodeId,
    iterations: usize,
}

impl Plan {
    /// The node matching the start worldstate; execution begins here.
    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn goal(&self) -> NodeId {
        self.tree.goal()
    }

    pub fn start_node(&self) -> &Node {
        self.tree.node(self.start)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.tree.node(id)
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut SearchTree {
        &mut self.tree
    }

    /// Number of nodes the search considered.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Actions in execution order.
    pub fn actions(&self) -> Vec<Arc<dyn Action>> {
        self.start_node()
            .parent_actions_path_list()
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    /// Nodes in execution order, from the start node to the goal node.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut chain = vec![self.start];
        chain.extend(self.start_node().parent_nodes_path_list().iter().rev());
        chain
    }

    pub fn path_cost(&self) -> f64 {
        self.start_node().path_cost()
    }

    pub fn len(&self) -> usize {
        self.start_node().parent_actions_path_list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Regressive best-first planner over a fixed action catalog.
#[derive(Debug, Clone)]
pub struct Planner {
    actions: Vec<Arc<dyn Action>>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(actions: impl Into<Vec<Arc<dyn Action>>>) -> Self {
        Self {
            actions: actions.into(),
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plans from `start_worldstate` to `goal`.
    ///
    /// `start_worldstate` must record every condition any action or the goal
    /// refers to.
    ///
    /// # Errors
    ///
    /// * `GoapError::PlanNotFound` - no node matching the start worldstate was
    ///   found before the open collection drained or the iteration ceiling
    ///   was hit
    /// * `GoapError::MissingConditionValue` - an action needed a condition the
    ///   start worldstate never recorded
    pub fn plan(&self, start_worldstate: &WorldState, goal: &Goal) -> Result<Plan> {
        let checked_actions: Vec<Arc<dyn Action>> = self
            .actions
            .iter()
            .filter(|action| {
                let ok = action.check_freeform_context();
                if !ok {
                    warn!("Ignoring action with bad freeform context: {}", action.name());
                }
                ok
            })
            .cloned()
            .collect();

        info!(
            "Planner started. actions: {:?}, start_worldstate: {}, goal: {}",
            self.actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            start_worldstate,
            goal
        );

        let mut goal_worldstate = WorldState::new();
        goal.apply_preconditions(&mut goal_worldstate);
        debug!("goal_worldstate: {}", goal_worldstate);

        let mut tree = SearchTree::new(goal_worldstate, start_worldstate);
        let goal_id = tree.goal();
        debug!("goal_node: {:?}", tree.node(goal_id));

        let mut open = OpenCollection::default();
        open.push(goal_id, tree.node(goal_id));

        let mut iterations = 0;
        while let Some(current) = open.pop() {
            iterations += 1;
            if iterations > self.config.max_iterations {
                error!(
                    "Planner stops because the loop limit ({}) is hit!",
                    self.config.max_iterations
                );
                break;
            }

            info!("Planning loop #{}", iterations);
            debug!("nodes left in open collection: {}", open.len());

            let node = tree.node(current);
            debug!("current node (least cost): {:?}", node);
            debug!("current node's worldstate: {}", node.worldstate());

            if start_worldstate.matches(node.worldstate()) {
                info!(
                    "Found plan! Considered nodes: {}; nodes left: {}",
                    iterations,
                    open.len()
                );
                return Ok(Plan {
                    tree,
                    start: current,
                    iterations,
                });
            }

            let helpful_actions =
                self.filter_matching_actions(node.worldstate(), start_worldstate, &checked_actions);
            let children = tree.get_child_nodes(current, &helpful_actions, start_worldstate)?;
            for child in children {
                open.push(child, tree.node(child));
            }
        }

        warn!("No plan found.");
        Err(GoapError::PlanNotFound)
    }

    /// Actions that might help between `start_worldstate` and a node's
    /// worldstate.
    fn filter_matching_actions(
        &self,
        worldstate: &WorldState,
        start_worldstate: &WorldState,
        actions: &[Arc<dyn Action>],
    ) -> Vec<Arc<dyn Action>> {
        let unsatisfied = worldstate.unsatisfied_conditions(start_worldstate);

        actions
            .iter()
            .filter(|action| {
                let helps = action.has_satisfying_effects(worldstate, start_worldstate, &unsatisfied);
                if helps {
                    debug!("helping action: {}", action.name());
                } else {
                    debug!("helpless action: {}", action.name());
                }
                helps
            })
            .cloned()
            .collect()
    }
}
