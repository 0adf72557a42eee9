use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FactTable, FactValue, ParseError, StateSchema};

/// A change an action makes to one fact.
///
/// Written in domain files as a bool, an absolute number, a signed delta string (`"+4"`,
/// `"-2"`), or any other string, which is stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEffect", into = "RawEffect")]
pub enum Effect {
    Bool(bool),
    Set(i64),
    Delta(i64),
    Text(String),
}

impl Effect {
    /// Whether the effect adds something: a gain, a `true` flag, a non-zero set, or text.
    pub fn is_positive(&self) -> bool {
        match self {
            Effect::Bool(b) => *b,
            Effect::Set(n) | Effect::Delta(n) => *n > 0,
            Effect::Text(_) => true,
        }
    }

    /// Value of the fact after this effect, given its current value.
    pub fn apply_to(&self, current: Option<&FactValue>) -> FactValue {
        match self {
            Effect::Bool(b) => FactValue::Bool(*b),
            Effect::Set(n) => FactValue::count(*n),
            Effect::Delta(d) => {
                let base = current.and_then(FactValue::as_number).unwrap_or(0);
                FactValue::count(base.saturating_add(*d))
            }
            Effect::Text(s) => FactValue::Text(s.clone()),
        }
    }

    /// Units a single application adds to a count currently at `current`.
    pub fn gain_from(&self, current: i64) -> i64 {
        match self {
            Effect::Delta(d) => (*d).max(0),
            Effect::Set(n) => n.saturating_sub(current).max(0),
            _ => 0,
        }
    }

    /// Units a single application removes from a count currently at `current`.
    pub fn loss_from(&self, current: i64) -> i64 {
        match self {
            Effect::Delta(d) => (-*d).max(0),
            Effect::Set(n) => current.saturating_sub(*n).max(0),
            _ => 0,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Bool(b) => write!(f, "{b}"),
            Effect::Set(n) => write!(f, "{n}"),
            Effect::Delta(d) => write!(f, "{d:+}"),
            Effect::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for Effect {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        match s {
            "" => return Err(ParseError::EmptyEffect),
            "true" => return Ok(Effect::Bool(true)),
            "false" => return Ok(Effect::Bool(false)),
            _ => {}
        }

        if s.starts_with('+') || s.starts_with('-') {
            // `+4` is accepted by i64 parsing as well as `-4`.
            return s
                .parse::<i64>()
                .map(Effect::Delta)
                .map_err(|_| ParseError::InvalidDelta(raw.to_string()));
        }

        if let Ok(n) = s.parse::<i64>() {
            return Ok(Effect::Set(n));
        }

        Ok(Effect::Text(s.to_string()))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawEffect {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl TryFrom<RawEffect> for Effect {
    type Error = ParseError;

    fn try_from(raw: RawEffect) -> Result<Self, Self::Error> {
        match raw {
            RawEffect::Bool(b) => Ok(Effect::Bool(b)),
            RawEffect::Number(n) => Ok(Effect::Set(n)),
            RawEffect::Text(s) => s.parse(),
        }
    }
}

impl From<Effect> for RawEffect {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Bool(b) => RawEffect::Bool(b),
            Effect::Set(n) => RawEffect::Number(n),
            Effect::Delta(d) => RawEffect::Text(format!("{d:+}")),
            Effect::Text(s) => RawEffect::Text(s),
        }
    }
}

/// Apply `effects` to a copy of `state`.
///
/// Counts are clamped to zero and composite facts are recomputed last. Effects that
/// target a composite fact are ignored; composites only ever follow their dependencies.
pub fn apply_effects(
    effects: &BTreeMap<String, Effect>,
    state: &FactTable,
    schema: &StateSchema,
) -> FactTable {
    let mut next = state.clone();
    for (key, effect) in effects {
        if schema.is_composite(key) {
            continue;
        }
        let value = effect.apply_to(next.get(key));
        next.raw_mut().insert(key.clone(), value);
    }
    next.clamp_counts();
    schema.resolve_composites(&mut next);
    next
}
