//! Structured explanation of why no plan was found.

use craft_core::{analyse_preconditions, ActionDomain, FactTable, FactValue, PreconditionStatus, StateSchema};
use serde::{Deserialize, Serialize};

use crate::goal::target_condition;
use crate::need::Need;
use crate::Goal;

/// Why a search stopped without a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFailure {
    IterationLimit,
    FrontierEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingRequirement {
    pub key: String,
    pub current: Option<FactValue>,
    pub target: FactValue,
    /// Units still missing for count targets.
    pub deficit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    /// An action that would move `for_key` toward its target, with its precondition trace.
    Action {
        for_key: String,
        action: String,
        cost: f64,
        preconditions: Vec<PreconditionStatus>,
    },
    /// A composite fact: satisfy any one of `alternatives` instead of running an action.
    ComputedState {
        key: String,
        alternatives: Vec<String>,
    },
}

impl Suggestion {
    pub fn is_computed_state(&self) -> bool {
        matches!(self, Suggestion::ComputedState { .. })
    }

    /// First precondition of an action suggestion that does not hold.
    pub fn first_unsatisfied(&self) -> Option<&PreconditionStatus> {
        match self {
            Suggestion::Action { preconditions, .. } => preconditions.iter().find(|p| !p.satisfied),
            Suggestion::ComputedState { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Set for goals that could not be parsed; nothing else is filled in then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub missing_requirements: Vec<MissingRequirement>,

    #[serde(default)]
    pub suggestions: Vec<Suggestion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<SearchFailure>,

    #[serde(default)]
    pub iterations: usize,
}

impl Diagnosis {
    pub fn from_error(error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn action_suggestions(&self) -> impl Iterator<Item = &Suggestion> {
        self.suggestions.iter().filter(|s| !s.is_computed_state())
    }

    pub fn computed_suggestions(&self) -> impl Iterator<Item = &Suggestion> {
        self.suggestions.iter().filter(|s| s.is_computed_state())
    }
}

/// Explain every unmet goal key against `state`.
///
/// Composite keys get a `ComputedState` suggestion listing their alternatives. Other keys
/// get one `Action` suggestion per action whose effect would move them toward the target,
/// cheapest first, each with its full precondition breakdown.
pub fn diagnose(
    goal: &Goal,
    state: &FactTable,
    domain: &ActionDomain,
    schema: &StateSchema,
) -> Diagnosis {
    let mut diagnosis = Diagnosis::default();

    for (key, target) in &goal.targets {
        let current = state.get(key);
        let condition = target_condition(target);
        let Some(need) = Need::of(&condition, current) else {
            continue;
        };

        diagnosis.missing_requirements.push(MissingRequirement {
            key: key.clone(),
            current: current.cloned(),
            target: target.clone(),
            deficit: need.deficit(),
        });

        if let Some(deps) = schema.dependencies(key) {
            diagnosis.suggestions.push(Suggestion::ComputedState {
                key: key.clone(),
                alternatives: deps.to_vec(),
            });
            continue;
        }

        let mut candidates: Vec<_> = domain
            .actions()
            .iter()
            .filter(|action| {
                action
                    .effects
                    .get(key)
                    .is_some_and(|effect| need.repeats(effect, current).is_some())
            })
            .collect();
        // Stable: equal costs keep domain order.
        candidates.sort_by(|a, b| a.cost.total_cmp(&b.cost));

        for action in candidates {
            let analysis = analyse_preconditions(&action.preconditions, state);
            diagnosis.suggestions.push(Suggestion::Action {
                for_key: key.clone(),
                action: action.name.clone(),
                cost: action.cost,
                preconditions: analysis.checked,
            });
        }
    }

    diagnosis
}
