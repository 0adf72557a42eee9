//! Failure kinds that reach the caller of goal resolution.

use craft_goap::Diagnosis;
use thiserror::Error;

/// Errors raised while building or running an [`Executor`](crate::Executor).
///
/// Precondition drift and skill failures never show up here: the executor absorbs them by
/// replanning.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("action `{action}` names skill `{skill}`, which is not registered")]
    UnknownSkill { action: String, skill: String },

    #[error("execution cancelled")]
    Cancelled,

    #[error("observing the world failed: {0}")]
    Observation(String),

    #[error("replanning for `{goal}` found no plan")]
    ReplanFailed { goal: String, diagnosis: Diagnosis },

    #[error("gave up on `{goal}` after {replans} replans")]
    ReplanLimit { goal: String, replans: u32 },
}

/// Terminal outcome of [`GoalResolver::resolve_goal`](crate::GoalResolver::resolve_goal).
///
/// Every variant except `Cancelled` carries the diagnosis of the level that failed and the
/// chain of goals from the top-level request down to it.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid goal `{goal}`: {message}")]
    InvalidGoal {
        goal: String,
        message: String,
        diagnosis: Diagnosis,
        goal_chain: Vec<String>,
    },

    #[error("`{goal}` is blocked by environment fact `{missing_environment}`")]
    EnvironmentalBlocker {
        goal: String,
        missing_environment: String,
        diagnosis: Diagnosis,
        goal_chain: Vec<String>,
    },

    #[error("depth limit {max_depth} exceeded at `{goal}` (chain: {})", .goal_chain.join(" -> "))]
    DepthExceeded {
        goal: String,
        max_depth: usize,
        diagnosis: Diagnosis,
        goal_chain: Vec<String>,
    },

    #[error("no subgoal could be extracted for `{goal}`")]
    NoSubgoal {
        goal: String,
        diagnosis: Diagnosis,
        goal_chain: Vec<String>,
    },

    #[error("search exhausted for `{goal}` after {attempts} attempts")]
    SearchExhausted {
        goal: String,
        attempts: usize,
        diagnosis: Diagnosis,
        goal_chain: Vec<String>,
    },

    #[error("cancelled while resolving `{goal}`")]
    Cancelled { goal: String },

    #[error("observing the world failed while resolving `{goal}`: {message}")]
    Observation {
        goal: String,
        message: String,
        goal_chain: Vec<String>,
    },

    #[error(transparent)]
    Execution(ExecutorError),
}

impl ResolveError {
    /// Failures a planner cannot fix by itself: a human or an outer reasoning layer has to
    /// decide what to do next.
    pub fn needs_external_judgment(&self) -> bool {
        matches!(
            self,
            ResolveError::EnvironmentalBlocker { .. } | ResolveError::DepthExceeded { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ResolveError::Cancelled { .. } | ResolveError::Execution(ExecutorError::Cancelled)
        )
    }

    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            ResolveError::InvalidGoal { diagnosis, .. }
            | ResolveError::EnvironmentalBlocker { diagnosis, .. }
            | ResolveError::DepthExceeded { diagnosis, .. }
            | ResolveError::NoSubgoal { diagnosis, .. }
            | ResolveError::SearchExhausted { diagnosis, .. } => Some(diagnosis),
            ResolveError::Execution(ExecutorError::ReplanFailed { diagnosis, .. }) => Some(diagnosis),
            _ => None,
        }
    }

    pub fn goal_chain(&self) -> &[String] {
        match self {
            ResolveError::InvalidGoal { goal_chain, .. }
            | ResolveError::EnvironmentalBlocker { goal_chain, .. }
            | ResolveError::DepthExceeded { goal_chain, .. }
            | ResolveError::NoSubgoal { goal_chain, .. }
            | ResolveError::SearchExhausted { goal_chain, .. }
            | ResolveError::Observation { goal_chain, .. } => goal_chain,
            _ => &[],
        }
    }

    pub fn missing_environment(&self) -> Option<&str> {
        match self {
            ResolveError::EnvironmentalBlocker {
                missing_environment,
                ..
            } => Some(missing_environment),
            _ => None,
        }
    }

    /// Record that this failure happened while resolving a subgoal of `parent`.
    pub(crate) fn with_parent_goal(mut self, parent: &str) -> Self {
        match &mut self {
            ResolveError::InvalidGoal { goal_chain, .. }
            | ResolveError::EnvironmentalBlocker { goal_chain, .. }
            | ResolveError::DepthExceeded { goal_chain, .. }
            | ResolveError::NoSubgoal { goal_chain, .. }
            | ResolveError::SearchExhausted { goal_chain, .. }
            | ResolveError::Observation { goal_chain, .. } => {
                goal_chain.insert(0, parent.to_string());
            }
            ResolveError::Cancelled { .. } | ResolveError::Execution(_) => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_goals_are_prepended() {
        let err = ResolveError::NoSubgoal {
            goal: "inventory.iron_ingot:1".into(),
            diagnosis: Diagnosis::default(),
            goal_chain: vec!["inventory.iron_ingot:1".into()],
        }
        .with_parent_goal("inventory.iron_pickaxe:1")
        .with_parent_goal("inventory.bucket:1");

        assert_eq!(
            err.goal_chain(),
            ["inventory.bucket:1", "inventory.iron_pickaxe:1", "inventory.iron_ingot:1"]
        );
        assert!(!err.needs_external_judgment());
        assert!(err.diagnosis().is_some());
    }

    #[test]
    fn cancellation_is_distinct_from_failure() {
        let err = ResolveError::Cancelled { goal: "x".into() }.with_parent_goal("y");
        assert!(err.is_cancelled());
        assert!(err.goal_chain().is_empty());
        assert!(err.diagnosis().is_none());
        assert!(!err.needs_external_judgment());
    }

    #[test]
    fn depth_error_renders_the_chain() {
        let err = ResolveError::DepthExceeded {
            goal: "c".into(),
            max_depth: 2,
            diagnosis: Diagnosis::default(),
            goal_chain: vec!["a".into(), "b".into(), "c".into()],
        };
        assert!(err.needs_external_judgment());
        assert_eq!(err.to_string(), "depth limit 2 exceeded at `c` (chain: a -> b -> c)");
    }
}
