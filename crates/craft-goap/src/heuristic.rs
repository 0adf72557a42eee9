use std::collections::{HashMap, HashSet};

use craft_core::{ActionDef, Condition, FactTable, StateSchema};

use crate::need::Need;
use crate::Goal;

/// Cost returned for requirements no action can reach, and on recursion cycles.
pub const UNREACHABLE: f64 = 1_000_000.0;

/// Requirement that a dependency of a composite fact be present.
pub(crate) fn presence_condition(schema: &StateSchema, key: &str) -> Condition {
    if schema.is_composite(key) {
        Condition::Bool(true)
    } else {
        Condition::at_least(1)
    }
}

/// Recursive cost estimator for one heuristic evaluation.
///
/// Memo and cycle set live only as long as the estimator, i.e. one `h(state)` call.
pub(crate) struct Estimator<'a> {
    actions: Vec<&'a ActionDef>,
    schema: &'a StateSchema,
    memo: HashMap<String, f64>,
    visiting: HashSet<String>,
}

impl<'a> Estimator<'a> {
    pub(crate) fn new(actions: Vec<&'a ActionDef>, schema: &'a StateSchema) -> Self {
        Self {
            actions,
            schema,
            memo: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    /// Max over goal keys: keys are pursued together and may share side effects.
    pub(crate) fn goal_cost(&mut self, goal: &Goal, state: &FactTable) -> f64 {
        goal.conditions()
            .map(|(key, condition)| self.estimate(key, &condition, state))
            .fold(0.0, f64::max)
    }

    /// Minimum additional cost to make `key` satisfy `condition` from `state`.
    pub(crate) fn estimate(&mut self, key: &str, condition: &Condition, state: &FactTable) -> f64 {
        let current = state.get(key);
        let Some(need) = Need::of(condition, current) else {
            return 0.0;
        };

        let signature = format!("{key}|{condition}|{need:?}");
        if let Some(&cost) = self.memo.get(&signature) {
            return cost;
        }
        if !self.visiting.insert(signature.clone()) {
            return UNREACHABLE;
        }

        let schema = self.schema;
        let cost = match schema.dependencies(key) {
            // Dependencies are alternatives: the cheapest one unlocks the composite.
            Some(deps) => match need {
                Need::Flag(true) => deps
                    .iter()
                    .map(|dep| {
                        let cond = presence_condition(schema, dep);
                        self.estimate(dep, &cond, state)
                    })
                    .fold(UNREACHABLE, f64::min),
                _ => UNREACHABLE,
            },
            None => self.cheapest_action(key, &need, state),
        };

        self.visiting.remove(&signature);
        self.memo.insert(signature, cost);
        cost
    }

    fn cheapest_action(&mut self, key: &str, need: &Need, state: &FactTable) -> f64 {
        let current = state.get(key);
        let mut best = UNREACHABLE;

        for idx in 0..self.actions.len() {
            let action = self.actions[idx];
            let Some(effect) = action.effects.get(key) else {
                continue;
            };
            let Some(repeats) = need.repeats(effect, current) else {
                continue;
            };

            // Preconditions are a conjunction: each one has to be paid for.
            let mut total = action.cost * repeats as f64;
            for (pre_key, pre_condition) in &action.preconditions {
                if total >= best {
                    break;
                }
                total += self.estimate(pre_key, pre_condition, state);
            }
            best = best.min(total);
        }

        best.min(UNREACHABLE)
    }
}
