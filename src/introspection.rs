use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::{debug, info};

use crate::node::{Node, NodeId, SearchTree};
use crate::planner::Plan;
use crate::world_state::WorldState;

/// Diagnostics hook the executor calls before running each step's action.
///
/// Nothing in planning or execution depends on what an introspector does.
pub trait Introspector {
    fn publish_update(&mut self, tree: &SearchTree, node: NodeId);
}

/// A visualizer for regressive GOAP plans that generates Graphviz DOT text.
///
/// Every node is labelled `<action> <id> n<cost> p<path cost> h<heuristic>
/// t<total cost>`, the goal node using `GOAL` as its action. As an
/// [`Introspector`] it records the label of every node it is updated with.
#[derive(Debug, Default)]
pub struct PlanVisualizer {
    updates: Vec<String>,
}

impl PlanVisualizer {
    pub fn new() -> Self {
        Self {
            updates: Vec::new(),
        }
    }

    /// Labels of the nodes published so far, in order.
    pub fn updates(&self) -> &[String] {
        &self.updates
    }

    /// Renders the chain of a solved plan, from the start node to the goal
    /// node.
    ///
    /// # Errors
    ///
    /// Returns `GoapError::Format` if formatting a node or edge fails.
    pub fn render_plan(&self, plan: &Plan) -> crate::Result<String> {
        let tree = plan.tree();
        let mut dot = String::new();
        Self::header(&mut dot, "RGOAP_PLAN")?;

        for id in plan.nodes() {
            let node = tree.node(id);
            let fill = if id == plan.start() {
                "lightgreen"
            } else if node.is_goal() {
                "lightpink"
            } else {
                "lightblue"
            };
            Self::write_node(&mut dot, id, node, fill)?;
        }
        for id in plan.nodes() {
            let node = tree.node(id);
            if let Some(next) = node.parent_node() {
                Self::write_edge(&mut dot, id, next, node)?;
            }
        }

        dot.push_str("}\n");
        info!("Visualizer rendered plan with {} nodes", plan.nodes().len());
        Ok(dot)
    }

    /// Renders the whole planning net, reconstructed from the goal node over
    /// every node's expansion.
    pub fn render_net(&self, tree: &SearchTree, start: Option<NodeId>) -> crate::Result<String> {
        let mut dot = String::new();
        Self::header(&mut dot, "RGOAP_NET")?;

        let mut pending = vec![tree.goal()];
        let mut edges = Vec::new();
        let mut count = 0;
        while let Some(id) = pending.pop() {
            let node = tree.node(id);
            let fill = if Some(id) == start {
                "lightgreen"
            } else if node.is_goal() {
                "lightpink"
            } else {
                "lightblue"
            };
            Self::write_node(&mut dot, id, node, fill)?;
            count += 1;

            for &prev in node.possible_prev_nodes() {
                edges.push((prev, id));
                pending.push(prev);
            }
        }
        for (from, to) in edges {
            Self::write_edge(&mut dot, from, to, tree.node(from))?;
        }

        dot.push_str("}\n");
        info!("Visualizer rendered net with {} nodes", count);
        Ok(dot)
    }

    /// Writes the rendered plan to `filename`.
    pub fn visualize_plan(&self, plan: &Plan, filename: impl AsRef<Path>) -> crate::Result<()> {
        self.write_dot(&self.render_plan(plan)?, filename)
    }

    /// Writes the rendered net to `filename`.
    pub fn visualize_net(
        &self,
        tree: &SearchTree,
        start: Option<NodeId>,
        filename: impl AsRef<Path>,
    ) -> crate::Result<()> {
        self.write_dot(&self.render_net(tree, start)?, filename)
    }

    fn write_dot(&self, dot: &str, filename: impl AsRef<Path>) -> crate::Result<()> {
        let mut file = File::create(filename)?;
        file.write_all(dot.as_bytes())?;
        Ok(())
    }

    fn header(dot: &mut impl fmt::Write, name: &str) -> fmt::Result {
        writeln!(dot, "digraph {} {{", name)?;
        writeln!(dot, "    rankdir=LR;")?;
        writeln!(dot, "    node [shape=box, style=filled];")?;
        writeln!(dot, "    edge [fontsize=10];")
    }

    fn write_node(dot: &mut impl fmt::Write, id: NodeId, node: &Node, fill: &str) -> fmt::Result {
        writeln!(
            dot,
            "    n{} [label=\"{}\\n{}\", fillcolor={}];",
            id,
            node_label(id, node),
            state_to_string(node.worldstate()),
            fill
        )
    }

    fn write_edge(
        dot: &mut impl fmt::Write,
        from: NodeId,
        to: NodeId,
        from_node: &Node,
    ) -> fmt::Result {
        let effects = from_node
            .action()
            .map(|action| {
                action
                    .effects()
                    .iter()
                    .map(|effect| effect.to_string())
                    .collect::<Vec<_>>()
                    .join("\\n")
            })
            .unwrap_or_default();
        writeln!(dot, "    n{} -> n{} [label=\"{}\"];", from, to, effects)
    }
}

impl Introspector for PlanVisualizer {
    fn publish_update(&mut self, tree: &SearchTree, node: NodeId) {
        let label = node_label(node, tree.node(node));
        debug!("Introspector published update for node: {}", label);
        self.updates.push(label);
    }
}

fn node_label(id: NodeId, node: &Node) -> String {
    let heuristic = node
        .heuristic_distance()
        .map_or_else(|| "?".to_string(), |h| h.to_string());
    format!(
        "{} {} n{} p{} h{} t{}",
        node.label(),
        id,
        node.cost(),
        node.path_cost(),
        heuristic,
        node.total_cost()
    )
}

fn state_to_string(state: &WorldState) -> String {
    let mut items: Vec<String> = state
        .iter()
        .map(|(condition, value)| match value {
            Some(value) => format!("{}: {}", condition, value),
            None => format!("{}: ?", condition),
        })
        .collect();
    items.sort();
    items.join("\\n")
}
