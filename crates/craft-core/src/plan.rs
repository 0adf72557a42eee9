use serde::{Deserialize, Serialize};

/// The externally-executable unit of a plan.
///
/// Carries only what the executor needs (skill and params); preconditions are looked up
/// again in the action domain when the step is re-validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: String,
    #[serde(default)]
    pub skill: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
    pub cost: f64,
}

impl PlanStep {
    /// A step with no skill attached only marks a goal; it is satisfied by construction.
    pub fn is_goal_marker(&self) -> bool {
        self.skill.is_none()
    }
}

/// Serializable plan data: an ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSpec {
    pub steps: Vec<PlanStep>,
}

impl PlanSpec {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.steps.iter().map(|s| s.cost).sum()
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.action.as_str()).collect()
    }
}
