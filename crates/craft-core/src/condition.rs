use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FactTable, FactValue, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
        }
    }
}

/// A requirement on a single fact.
///
/// Written in domain files as a bool, a number (shorthand for `== n`), or a string: a
/// comparator (`">= 3"`), `"true"`/`"false"`, or any other text for an exact match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub enum Condition {
    Bool(bool),
    Compare { op: CompareOp, value: f64 },
    Text(String),
}

impl Condition {
    pub fn at_least(n: i64) -> Self {
        Condition::Compare {
            op: CompareOp::Ge,
            value: n as f64,
        }
    }

    pub fn equals(n: i64) -> Self {
        Condition::Compare {
            op: CompareOp::Eq,
            value: n as f64,
        }
    }

    /// Whether `value` satisfies this condition. An absent fact never does.
    pub fn is_satisfied_by(&self, value: Option<&FactValue>) -> bool {
        evaluate(value, self)
    }

    /// Smallest count that satisfies a numeric condition reachable by increasing the fact.
    pub fn numeric_floor(&self) -> Option<i64> {
        match self {
            Condition::Compare { op, value } => match op {
                CompareOp::Ge | CompareOp::Eq => Some(value.ceil() as i64),
                CompareOp::Gt => Some((value.floor() as i64).saturating_add(1)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Bool(b) => write!(f, "{b}"),
            Condition::Compare { op, value } => write!(f, "{} {}", op.symbol(), value),
            Condition::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for Condition {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        match s {
            "true" => return Ok(Condition::Bool(true)),
            "false" => return Ok(Condition::Bool(false)),
            "" => return Err(ParseError::EmptyCondition),
            _ => {}
        }

        // Two-character operators first so `>=` is not read as `>`.
        const OPS: [(&str, CompareOp); 6] = [
            (">=", CompareOp::Ge),
            ("<=", CompareOp::Le),
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            (">", CompareOp::Gt),
            ("<", CompareOp::Lt),
        ];
        for (symbol, op) in OPS {
            if let Some(rest) = s.strip_prefix(symbol) {
                let value = parse_finite(rest.trim())
                    .ok_or_else(|| ParseError::InvalidComparator(raw.to_string()))?;
                return Ok(Condition::Compare { op, value });
            }
        }

        if let Some(value) = parse_finite(s) {
            return Ok(Condition::Compare {
                op: CompareOp::Eq,
                value,
            });
        }

        Ok(Condition::Text(s.to_string()))
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawCondition {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl TryFrom<RawCondition> for Condition {
    type Error = ParseError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match raw {
            RawCondition::Bool(b) => Ok(Condition::Bool(b)),
            RawCondition::Number(n) if n.is_finite() => Ok(Condition::Compare {
                op: CompareOp::Eq,
                value: n,
            }),
            RawCondition::Number(n) => Err(ParseError::InvalidComparator(n.to_string())),
            RawCondition::Text(s) => s.parse(),
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::Bool(b) => RawCondition::Bool(b),
            Condition::Compare {
                op: CompareOp::Eq,
                value,
            } => RawCondition::Number(value),
            other @ Condition::Compare { .. } => RawCondition::Text(other.to_string()),
            Condition::Text(s) => RawCondition::Text(s),
        }
    }
}

/// Evaluate `condition` against a fact value.
///
/// Closed world: an absent value is `false` for every condition kind, including ones such
/// as `>= 0` that any present count would satisfy.
pub fn evaluate(value: Option<&FactValue>, condition: &Condition) -> bool {
    let Some(value) = value else {
        return false;
    };

    match (condition, value) {
        (Condition::Bool(expected), FactValue::Bool(actual)) => expected == actual,
        (Condition::Compare { op, value: rhs }, FactValue::Number(lhs)) => {
            op.holds(*lhs as f64, *rhs)
        }
        (Condition::Text(expected), FactValue::Text(actual)) => expected == actual,
        _ => false,
    }
}

/// Conjunction of [`evaluate`] over every precondition.
///
/// The planner and the executor both call this, so a plan is always re-verifiable at
/// execution time with the predicate that produced it.
pub fn are_preconditions_satisfied(
    conditions: &BTreeMap<String, Condition>,
    state: &FactTable,
) -> bool {
    conditions
        .iter()
        .all(|(key, condition)| evaluate(state.get(key), condition))
}

/// Per-precondition breakdown against a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreconditionStatus {
    pub key: String,
    pub current: Option<FactValue>,
    pub required: Condition,
    pub satisfied: bool,
}

impl PreconditionStatus {
    /// How many more units of a numeric fact are needed, if the requirement is a floor.
    pub fn shortage(&self) -> Option<i64> {
        let floor = self.required.numeric_floor()?;
        let current = self.current.as_ref().and_then(FactValue::as_number).unwrap_or(0);
        Some(floor.saturating_sub(current).max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreconditionAnalysis {
    pub satisfied: bool,
    pub checked: Vec<PreconditionStatus>,
}

impl PreconditionAnalysis {
    pub fn missing(&self) -> impl Iterator<Item = &PreconditionStatus> {
        self.checked.iter().filter(|s| !s.satisfied)
    }
}

pub fn analyse_preconditions(
    conditions: &BTreeMap<String, Condition>,
    state: &FactTable,
) -> PreconditionAnalysis {
    let checked: Vec<PreconditionStatus> = conditions
        .iter()
        .map(|(key, required)| {
            let current = state.get(key).cloned();
            let satisfied = evaluate(current.as_ref(), required);
            PreconditionStatus {
                key: key.clone(),
                current,
                required: required.clone(),
                satisfied,
            }
        })
        .collect();

    PreconditionAnalysis {
        satisfied: checked.iter().all(|s| s.satisfied),
        checked,
    }
}
