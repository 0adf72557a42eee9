use core::fmt;
use std::collections::BTreeMap;

use craft_core::{evaluate, ActionDomain, Condition, Effect, FactTable, FactValue, StateSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoalError {
    #[error("empty goal")]
    Empty,

    #[error("malformed goal `{0}`: expected `key:count`, `key:true|false`, a fact, or an action name")]
    Malformed(String),

    #[error("unknown goal `{0}`: not an action and not a known fact")]
    Unknown(String),

    #[error("action `{0}` has no positive effects to aim for")]
    NoPositiveEffects(String),
}

/// Where a goal came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum GoalSource {
    /// `key:value` or a bare fact.
    State,
    /// The positive effects of a named action.
    Action(String),
}

/// Target values for a set of facts. A state satisfies the goal when every target holds:
/// counts at or above the target, flags and text equal to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub input: String,
    pub source: GoalSource,
    pub targets: BTreeMap<String, FactValue>,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, target) in &self.targets {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{key}:{target}")?;
        }
        Ok(())
    }
}

impl Goal {
    /// Parse a goal string against a domain and schema.
    ///
    /// Accepted forms, in order: `key:N`, `key:true|false`, an action name (its positive
    /// effects become the targets, a `+N` delta becoming an absolute `N`), and a bare fact
    /// known to the schema or produced by some action (target `true`).
    pub fn parse(
        input: &str,
        domain: &ActionDomain,
        schema: &StateSchema,
    ) -> Result<Self, GoalError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(GoalError::Empty);
        }

        if let Some((key, value)) = input.split_once(':') {
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() || key.contains(char::is_whitespace) {
                return Err(GoalError::Malformed(input.to_string()));
            }
            let target = match value {
                "true" => FactValue::Bool(true),
                "false" => FactValue::Bool(false),
                _ => match value.parse::<i64>() {
                    Ok(n) if n >= 0 => FactValue::Number(n),
                    _ => return Err(GoalError::Malformed(input.to_string())),
                },
            };
            return Ok(Self {
                input: input.to_string(),
                source: GoalSource::State,
                targets: BTreeMap::from([(key.to_string(), target)]),
            });
        }

        if let Some(action) = domain.get(input) {
            let targets: BTreeMap<String, FactValue> = action
                .effects
                .iter()
                .filter(|(key, _)| !schema.is_composite(key))
                .filter_map(|(key, effect)| positive_target(effect).map(|t| (key.clone(), t)))
                .collect();
            if targets.is_empty() {
                return Err(GoalError::NoPositiveEffects(input.to_string()));
            }
            return Ok(Self {
                input: input.to_string(),
                source: GoalSource::Action(action.name.clone()),
                targets,
            });
        }

        if schema.contains(input) || domain.produces(input) {
            return Ok(Self {
                input: input.to_string(),
                source: GoalSource::State,
                targets: BTreeMap::from([(input.to_string(), FactValue::Bool(true))]),
            });
        }

        if input.contains(char::is_whitespace) {
            return Err(GoalError::Malformed(input.to_string()));
        }
        Err(GoalError::Unknown(input.to_string()))
    }

    /// Turn requested amounts into absolute targets: counts become `current + requested`,
    /// flags and text are unchanged.
    ///
    /// Asking twice for `inventory.x:2` therefore asks for two more each time instead of
    /// being satisfied by stock from the first request.
    pub fn adjusted(&self, state: &FactTable) -> Self {
        let targets = self
            .targets
            .iter()
            .map(|(key, target)| {
                let target = match target {
                    FactValue::Number(n) => FactValue::count(state.count(key).saturating_add(*n)),
                    other => other.clone(),
                };
                (key.clone(), target)
            })
            .collect();
        Self {
            input: self.input.clone(),
            source: self.source.clone(),
            targets,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Targets as conditions, evaluated with the same predicate as action preconditions.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, Condition)> {
        self.targets
            .iter()
            .map(|(key, target)| (key.as_str(), target_condition(target)))
    }

    pub fn is_satisfied(&self, state: &FactTable) -> bool {
        self.conditions()
            .all(|(key, condition)| evaluate(state.get(key), &condition))
    }

    /// `(key, n)` when the goal asks for a single count.
    pub fn single_quantity(&self) -> Option<(&str, i64)> {
        if self.targets.len() != 1 {
            return None;
        }
        let (key, target) = self.targets.iter().next()?;
        target.as_number().map(|n| (key.as_str(), n))
    }

    pub fn target(&self, key: &str) -> Option<&FactValue> {
        self.targets.get(key)
    }
}

pub(crate) fn target_condition(target: &FactValue) -> Condition {
    match target {
        FactValue::Number(n) => Condition::at_least(*n),
        FactValue::Bool(b) => Condition::Bool(*b),
        FactValue::Text(s) => Condition::Text(s.clone()),
    }
}

fn positive_target(effect: &Effect) -> Option<FactValue> {
    match effect {
        Effect::Delta(n) | Effect::Set(n) if *n > 0 => Some(FactValue::Number(*n)),
        Effect::Bool(true) => Some(FactValue::Bool(true)),
        Effect::Text(s) => Some(FactValue::Text(s.clone())),
        _ => None,
    }
}
