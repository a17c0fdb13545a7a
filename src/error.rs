use thiserror::Error;

/// Error types for the regressive GOAP planner.
///
/// Planning and execution failures are ordinary values so that a control loop
/// can retry or replan. Misuse of the search tree (expanding a node twice,
/// computing a heuristic twice) is not represented here; those are assertions.
///
/// # Examples
///
/// ```
/// use rgoap::GoapError;
///
/// let error = GoapError::PreconditionViolation("open_door".to_string());
/// assert_eq!(format!("{}", error), "Action precondition not met: open_door");
/// ```
#[derive(Error, Debug)]
pub enum GoapError {
    // Plan errors
    /// The open collection drained, or the iteration ceiling was hit, without
    /// reaching a node that matches the start worldstate
    #[error("No valid plan found to achieve the goal")]
    PlanNotFound,

    // Action errors
    /// An action's freeform context check failed
    #[error("Action context invalid: {0}")]
    InvalidActionContext(String),

    /// The live worldstate no longer satisfies the action about to run
    #[error("Action precondition not met: {0}")]
    PreconditionViolation(String),

    /// Error when attempting to create an action with zero or negative cost
    #[error("Action cost must be positive")]
    InvalidActionCost,

    /// An action's side effect reported a failure
    #[error("Action failed: {0}")]
    ActionFailed(String),

    // Condition errors
    /// Lookup of a condition that the worldstate never recorded
    #[error("Condition value missing: {0}")]
    MissingConditionValue(String),

    /// A condition with this name is already part of the registry
    #[error("Condition already registered: {0}")]
    ConditionAlreadyRegistered(String),

    /// No condition with this name is part of the registry
    #[error("Unknown condition: {0}")]
    UnknownCondition(String),

    /// A step delegated to a foreign state machine reported `Aborted`
    #[error("Execution aborted: {0}")]
    Aborted(String),

    // IO errors
    /// Writing a rendered graph failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Formatting a rendered graph failed
    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Result type alias for GOAP operations
pub type Result<T> = std::result::Result<T, GoapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_plan_not_found_display() {
        let err = GoapError::PlanNotFound;
        assert_eq!(
            format!("{}", err),
            "No valid plan found to achieve the goal"
        );
    }

    #[test]
    fn test_invalid_action_context_display() {
        let err = GoapError::InvalidActionContext("foo".to_string());
        assert_eq!(format!("{}", err), "Action context invalid: foo");
    }

    #[test]
    fn test_precondition_violation_display() {
        let err = GoapError::PreconditionViolation("bar".to_string());
        assert_eq!(format!("{}", err), "Action precondition not met: bar");
    }

    #[test]
    fn test_missing_condition_value_display() {
        let err = GoapError::MissingConditionValue("door".to_string());
        assert_eq!(format!("{}", err), "Condition value missing: door");
    }

    #[test]
    fn test_invalid_action_cost_display() {
        let err = GoapError::InvalidActionCost;
        assert_eq!(format!("{}", err), "Action cost must be positive");
    }

    #[test]
    fn test_format_error_converts() {
        let err: GoapError = std::fmt::Error.into();
        assert!(matches!(err, GoapError::Format(_)));
        assert!(format!("{}", err).starts_with("Format error: "));
    }

    #[test]
    fn test_error_trait() {
        let err = GoapError::PlanNotFound;
        assert!(err.source().is_none());
    }
}
