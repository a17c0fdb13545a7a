//! Vertices of the regressive search.
//!
//! The planner grows a tree backwards from the goal: the root is the goal
//! node, every child holds the worldstate that has to hold *before* its
//! action runs so that the parent's worldstate holds afterwards. All nodes of
//! one search live in a [`SearchTree`] arena and refer to each other through
//! [`NodeId`]s.
//!
//! ```text
//!   goal  <--a1--  n1  <--a2--  n2 (matches start)
//! ```
//!
//! Executing the plan walks the other way: from `n2` run `a2` to reach `n1`,
//! run `a1` to reach the goal.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::action::Action;
use crate::condition::Condition;
use crate::error::Result;
use crate::world_state::WorldState;

/// Index of a node inside its [`SearchTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// One step of a reverse plan.
///
/// For the goal node the action is unset, both path lists are empty and the
/// cost is zero.
pub struct Node {
    worldstate: WorldState,
    action: Option<Arc<dyn Action>>,
    parent_nodes_path_list: Vec<NodeId>,
    parent_actions_path_list: Vec<Arc<dyn Action>>,
    possible_prev_nodes: Vec<NodeId>,
    expanded: bool,
    ancestors_cost: f64,
    heuristic_distance: Option<f64>,
}

impl Node {
    fn new(
        worldstate: WorldState,
        action: Option<Arc<dyn Action>>,
        parent_nodes_path_list: Vec<NodeId>,
        parent_actions_path_list: Vec<Arc<dyn Action>>,
        ancestors_cost: f64,
    ) -> Self {
        Self {
            worldstate,
            action,
            parent_nodes_path_list,
            parent_actions_path_list,
            possible_prev_nodes: Vec::new(),
            expanded: false,
            ancestors_cost,
            heuristic_distance: None,
        }
    }

    /// State at this point of the plan.
    pub fn worldstate(&self) -> &WorldState {
        &self.worldstate
    }

    /// Action that, run forwards from this node, leads to the parent node.
    pub fn action(&self) -> Option<&Arc<dyn Action>> {
        self.action.as_ref()
    }

    /// Nodes from the goal node up to, excluding, this node.
    pub fn parent_nodes_path_list(&self) -> &[NodeId] {
        &self.parent_nodes_path_list
    }

    /// Actions leading from the goal regressively to this node, ending with
    /// this node's own action. Same length as the node path.
    pub fn parent_actions_path_list(&self) -> &[Arc<dyn Action>] {
        &self.parent_actions_path_list
    }

    /// Children found when this node was expanded. Empty until then.
    pub fn possible_prev_nodes(&self) -> &[NodeId] {
        &self.possible_prev_nodes
    }

    pub fn heuristic_distance(&self) -> Option<f64> {
        self.heuristic_distance
    }

    pub fn is_goal(&self) -> bool {
        self.action.is_none()
    }

    /// The next node when executing forwards; `None` for the goal node.
    pub fn parent_node(&self) -> Option<NodeId> {
        self.parent_nodes_path_list.last().copied()
    }

    /// Cost of this node's action.
    pub fn cost(&self) -> f64 {
        self.action.as_ref().map_or(0.0, |action| action.cost())
    }

    /// Own cost plus the cost of every node between this one and the goal.
    pub fn path_cost(&self) -> f64 {
        self.cost() + self.ancestors_cost
    }

    /// Search priority: path cost plus heuristic distance.
    pub fn total_cost(&self) -> f64 {
        self.path_cost() + self.heuristic_distance.unwrap_or(0.0)
    }

    pub(crate) fn label(&self) -> &str {
        self.action.as_ref().map_or("GOAL", |action| action.name())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Node cost={} pathc={} heur_dist={:?} totalc={} action={}>",
            self.cost(),
            self.path_cost(),
            self.heuristic_distance,
            self.total_cost(),
            self.label()
        )
    }
}

/// Arena holding every node created during one planning run.
///
/// The goal node is always the root.
#[derive(Debug)]
pub struct SearchTree {
    nodes: Vec<Node>,
}

impl SearchTree {
    /// Creates a tree holding only the goal node, with its heuristic computed
    /// against `start_worldstate`.
    pub fn new(goal_worldstate: WorldState, start_worldstate: &WorldState) -> Self {
        let mut tree = Self {
            nodes: vec![Node::new(goal_worldstate, None, Vec::new(), Vec::new(), 0.0)],
        };
        tree.calc_heuristic_distance(tree.goal(), start_worldstate);
        tree
    }

    pub fn goal(&self) -> NodeId {
        NodeId(0)
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn worldstate_mut(&mut self, id: NodeId) -> &mut WorldState {
        &mut self.nodes[id.0].worldstate
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Builds one child of `id` per action: the action regresses a copy of the
    /// node's worldstate relative to `start_worldstate`, and the child gets its
    /// heuristic right away.
    ///
    /// # Panics
    ///
    /// Panics if the node has been expanded before.
    pub fn get_child_nodes(
        &mut self,
        id: NodeId,
        actions: &[Arc<dyn Action>],
        start_worldstate: &WorldState,
    ) -> Result<Vec<NodeId>> {
        assert!(
            !self.nodes[id.0].expanded,
            "Node children should be generated only once"
        );
        self.nodes[id.0].expanded = true;

        let mut children = Vec::with_capacity(actions.len());
        for action in actions {
            let parent = &self.nodes[id.0];

            let mut nodes_path_list = parent.parent_nodes_path_list.clone();
            nodes_path_list.push(id);
            let mut actions_path_list = parent.parent_actions_path_list.clone();
            actions_path_list.push(action.clone());
            let ancestors_cost = parent.path_cost();

            let mut worldstate = parent.worldstate.clone();
            action.apply_preconditions(&mut worldstate, start_worldstate)?;

            let child = NodeId(self.nodes.len());
            self.nodes.push(Node::new(
                worldstate,
                Some(action.clone()),
                nodes_path_list,
                actions_path_list,
                ancestors_cost,
            ));
            self.calc_heuristic_distance(child, start_worldstate);

            self.nodes[id.0].possible_prev_nodes.push(child);
            children.push(child);
        }

        Ok(children)
    }

    /// Sets the heuristic distance of `id`: an estimate of how far the node's
    /// worldstate is from `start_worldstate`.
    ///
    /// Every condition differing from the start contributes. The goal node has
    /// nothing to compare against and counts 1 per condition. Other nodes
    /// compare numeric values against the goal value, so a condition halfway
    /// between start and goal counts 0.5. The sum never exceeds the number of
    /// differing conditions.
    fn calc_heuristic_distance(&mut self, id: NodeId, start_worldstate: &WorldState) {
        let distance = {
            let node = &self.nodes[id.0];
            assert!(
                node.heuristic_distance.is_none(),
                "Node heuristic should be calculated only once"
            );

            let unsatisfied = node.worldstate.unsatisfied_conditions(start_worldstate);
            let limit = unsatisfied.len() as f64;

            if node.is_goal() {
                limit
            } else {
                let goal_worldstate = &self.nodes[node.parent_nodes_path_list[0].0].worldstate;
                let sum: f64 = unsatisfied
                    .iter()
                    .map(|condition| {
                        condition_distance(
                            condition,
                            &node.worldstate,
                            goal_worldstate,
                            start_worldstate,
                        )
                    })
                    .sum();
                sum.min(limit)
            }
        };

        self.nodes[id.0].heuristic_distance = Some(distance);
    }
}

/// Distance contribution of one differing condition.
///
/// Numeric conditions part of the goal yield
/// `|node - start| / |goal - start|`: below 1 while progressing, 1 at the goal
/// value, above 1 when moving away. Everything else counts 1.
fn condition_distance(
    condition: &Condition,
    worldstate: &WorldState,
    goal_worldstate: &WorldState,
    start_worldstate: &WorldState,
) -> f64 {
    // conditions introduced by actions were never part of the goal
    let goal_value = match goal_worldstate.get_condition_value(condition) {
        Ok(value) => value,
        Err(_) => return 1.0,
    };
    let node_value = worldstate.get_condition_value(condition).ok().flatten();
    let start_value = start_worldstate.get_condition_value(condition).ok().flatten();

    let numeric = (
        goal_value.and_then(|v| v.as_f64()),
        node_value.and_then(|v| v.as_f64()),
        start_value.and_then(|v| v.as_f64()),
    );
    match numeric {
        (Some(goal), Some(node), Some(start)) => {
            let distance_total = (goal - start).abs();
            if distance_total == 0.0 {
                return 1.0;
            }
            let distance_remaining = (node - start).abs();
            let relative_distance = distance_remaining / distance_total;
            debug!(
                "comparing condition {}: relative_distance = distance_left / distance_total = {} / {} = {}",
                condition, distance_remaining, distance_total, relative_distance
            );
            relative_distance
        }
        _ => 1.0,
    }
}
