use std::fmt;

use crate::action::Precondition;
use crate::error::Result;
use crate::world_state::WorldState;

/// A target condition set plus a usability score.
///
/// The planner only uses the preconditions; the usability is read by the
/// [`Runner`](crate::Runner) to rank several goals against each other.
///
/// # Examples
///
/// ```
/// use rgoap::{Condition, Goal, Precondition, WorldState};
///
/// let door = Condition::new("door");
/// let goal = Goal::new("door_open", vec![Precondition::new(door.clone(), "open")])
///     .with_usability(0.8);
///
/// let mut goal_state = WorldState::new();
/// goal.apply_preconditions(&mut goal_state);
/// assert!(goal.is_valid(&goal_state).unwrap());
/// assert_eq!(goal.usability(), 0.8);
/// ```
#[derive(Debug, Clone)]
pub struct Goal {
    name: String,
    preconditions: Vec<Precondition>,
    usability: f64,
}

impl Goal {
    pub fn new(name: impl Into<String>, preconditions: Vec<Precondition>) -> Self {
        Self {
            name: name.into(),
            preconditions,
            usability: 1.0,
        }
    }

    pub fn with_usability(mut self, usability: f64) -> Self {
        self.usability = usability;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usability(&self) -> f64 {
        self.usability
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Records every goal condition in `worldstate`, producing the "done"
    /// state the planner starts from.
    pub fn apply_preconditions(&self, worldstate: &mut WorldState) {
        for precondition in &self.preconditions {
            precondition.apply(worldstate);
        }
    }

    /// Whether the goal is already reached in `worldstate`.
    pub fn is_valid(&self, worldstate: &WorldState) -> Result<bool> {
        for precondition in &self.preconditions {
            if !precondition.is_valid(worldstate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (usability {})", self.name, self.usability)
    }
}
