use std::sync::Arc;

use rgoap::{
    Action, ActionBag, BasicAction, Condition, GoapError, Goal, PlanExecutor, PlanVisualizer,
    Planner, Precondition, Value, WorldState,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn door_world() -> WorldState {
        let mut start = WorldState::new();
        start.memorize_condition_value(Condition::new("door"), "closed");
        start.memorize_condition_value(Condition::new("at_door"), false);
        start
    }

    fn door_actions() -> ActionBag {
        let mut actions = ActionBag::new();
        actions.add(
            BasicAction::new("WalkToDoor", 1.0)
                .unwrap()
                .with_effect("at_door", true),
        );
        actions.add(
            BasicAction::new("OpenDoor", 1.0)
                .unwrap()
                .with_precondition("at_door", true)
                .with_effect("door", "open"),
        );
        actions
    }

    fn door_goal() -> Goal {
        Goal::new("door_open", vec![Precondition::new("door", "open")])
    }

    fn names(actions: &[Arc<dyn Action>]) -> Vec<&str> {
        actions.iter().map(|a| a.name()).collect()
    }

    #[test]
    fn test_door_workflow() {
        let start = door_world();
        let planner = Planner::new(door_actions());

        let mut plan = planner.plan(&start, &door_goal()).unwrap();
        let actions = plan.actions();
        assert_eq!(names(&actions), ["WalkToDoor", "OpenDoor"]);
        assert_eq!(plan.path_cost(), 2.0);

        // forward walk from the start node ends at the goal node
        let mut node = plan.start_node();
        while let Some(next) = node.parent_node() {
            node = plan.node(next);
        }
        assert!(node.is_goal());

        let mut live = start.clone();
        PlanExecutor::new().execute(&mut plan, &mut live).unwrap();
        assert!(door_goal().is_valid(&live).unwrap());
    }

    #[test]
    fn test_path_cost_is_sum_of_action_costs() {
        let mut actions = ActionBag::new();
        actions.add(
            BasicAction::new("gather_wood", 1.5)
                .unwrap()
                .with_precondition("has_axe", true)
                .with_effect("has_wood", true),
        );
        actions.add(
            BasicAction::new("build_house", 2.25)
                .unwrap()
                .with_precondition("has_wood", true)
                .with_effect("has_house", true),
        );
        actions.add(
            BasicAction::new("plant_garden", 0.5)
                .unwrap()
                .with_precondition("has_house", true)
                .with_effect("has_garden", true),
        );

        let start: WorldState = [
            (Condition::new("has_axe"), true),
            (Condition::new("has_wood"), false),
            (Condition::new("has_house"), false),
            (Condition::new("has_garden"), false),
        ]
        .into_iter()
        .collect();
        let goal = Goal::new("garden", vec![Precondition::new("has_garden", true)]);

        let plan = Planner::new(actions).plan(&start, &goal).unwrap();
        let total: f64 = plan.actions().iter().map(|a| a.cost()).sum();
        assert_eq!(names(&plan.actions()), ["gather_wood", "build_house", "plant_garden"]);
        assert_eq!(plan.path_cost(), total);
        assert_eq!(plan.path_cost(), 4.25);
    }

    #[test]
    fn test_impossible_goal() {
        let mut actions = ActionBag::new();
        actions.add(
            BasicAction::new("WalkToDoor", 1.0)
                .unwrap()
                .with_effect("at_door", true),
        );

        let result = Planner::new(actions).plan(&door_world(), &door_goal());
        assert!(matches!(result, Err(GoapError::PlanNotFound)));
    }

    #[test]
    fn test_bad_context_action_never_expanded() {
        let mut actions = door_actions();
        actions.add(
            BasicAction::new("KickDoorOpen", 0.5)
                .unwrap()
                .with_effect("door", "open")
                .with_context(|| false),
        );

        let plan = Planner::new(actions).plan(&door_world(), &door_goal()).unwrap();
        assert_eq!(names(&plan.actions()), ["WalkToDoor", "OpenDoor"]);
        assert!(plan
            .tree()
            .iter()
            .filter_map(|(_, node)| node.action())
            .all(|action| action.name() != "KickDoorOpen"));
    }

    #[test]
    fn test_goal_heuristic_counts_disagreements() {
        let start = door_world();
        let goal = Goal::new(
            "both",
            vec![
                Precondition::new("door", "open"),
                Precondition::new("at_door", true),
            ],
        );

        let plan = Planner::new(door_actions()).plan(&start, &goal).unwrap();
        let goal_node = plan.node(plan.goal());
        assert_eq!(goal_node.heuristic_distance(), Some(2.0));

        for (_, node) in plan.tree().iter() {
            let differing = node.worldstate().unsatisfied_conditions(&start).len() as f64;
            assert!(node.heuristic_distance().unwrap() <= differing);
        }
    }

    #[test]
    fn test_no_duplicate_detection() {
        // both orders of two independent switches reach the same state
        let mut actions = ActionBag::new();
        actions.add(BasicAction::new("a_on", 1.0).unwrap().with_effect("a", true));
        actions.add(BasicAction::new("b_on", 1.0).unwrap().with_effect("b", true));

        let start: WorldState = [(Condition::new("a"), false), (Condition::new("b"), false)]
            .into_iter()
            .collect();
        let goal = Goal::new(
            "both",
            vec![Precondition::new("a", true), Precondition::new("b", true)],
        );

        let plan = Planner::new(actions).plan(&start, &goal).unwrap();
        assert_eq!(plan.len(), 2);

        let matching_start = plan
            .tree()
            .iter()
            .filter(|(_, node)| start.matches(node.worldstate()))
            .count();
        assert_eq!(matching_start, 2);
        assert_eq!(plan.tree().len(), 5);
    }

    #[test]
    fn test_visualize_planning() {
        let plan = Planner::new(door_actions()).plan(&door_world(), &door_goal()).unwrap();
        let visualizer = PlanVisualizer::new();

        let dot = visualizer.render_plan(&plan).unwrap();
        assert!(dot.contains("WalkToDoor"));
        assert!(dot.contains("OpenDoor"));
        assert!(dot.contains("door: open"));

        let net = visualizer.render_net(plan.tree(), Some(plan.start())).unwrap();
        assert!(net.contains("GOAL"));
    }

    #[test]
    fn test_numeric_conditions_compare_across_int_and_float() {
        let mut actions = ActionBag::new();
        actions.add(
            BasicAction::new("charge", 1.0)
                .unwrap()
                .with_precondition("battery", Value::Float(0.0))
                .with_effect("battery", 100),
        );
        let start: WorldState = [(Condition::new("battery"), 0)].into_iter().collect();
        let goal = Goal::new("full", vec![Precondition::new("battery", 100.0)]);

        let plan = Planner::new(actions).plan(&start, &goal).unwrap();
        assert_eq!(names(&plan.actions()), ["charge"]);
    }

    #[test]
    fn test_deviation_tolerates_imprecise_effect() {
        let approach: Arc<dyn Action> = Arc::new(
            BasicAction::new("approach_dock", 2.0)
                .unwrap()
                .with_effect("position", 10.0)
                .with_run(|next| {
                    // the drive stops a little short of the target
                    next.memorize_condition_value(Condition::new("position"), 9.7);
                    Ok(())
                }),
        );
        let mut actions = ActionBag::new();
        actions.add_shared(approach.clone());
        actions.add(
            BasicAction::new("dock", 1.0)
                .unwrap()
                .with_precondition_within("position", 10.0, 0.5)
                .with_effect("docked", true),
        );

        let mut start = WorldState::new();
        start.memorize_condition_value(Condition::new("position"), 0.0);
        start.memorize_condition_value(Condition::new("docked"), false);
        let goal = Goal::new("docked", vec![Precondition::new("docked", true)]);

        let mut plan = Planner::new(actions).plan(&start, &goal).unwrap();
        assert_eq!(names(&plan.actions()), [approach.name(), "dock"]);
        assert_eq!(plan.goal().index(), 0);
        assert!(plan.start().index() < plan.tree().len());

        let mut live = start.clone();
        PlanExecutor::new().execute(&mut plan, &mut live).unwrap();

        let docked = live.get_condition_value(&Condition::new("docked")).unwrap();
        assert_eq!(docked.and_then(Value::as_bool), Some(true));
        let position = live.get_condition_value(&Condition::new("position")).unwrap();
        assert_eq!(position.and_then(Value::as_f64), Some(9.7));
    }
}
