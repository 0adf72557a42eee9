use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single fact value: a non-negative count, a flag, or an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl FactValue {
    /// Build a numeric fact, clamping negative counts to zero.
    pub fn count(n: i64) -> Self {
        FactValue::Number(n.max(0))
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            FactValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FactValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by composite facts: `true`, or a count of at least one.
    pub fn is_present(&self) -> bool {
        match self {
            FactValue::Bool(b) => *b,
            FactValue::Number(n) => *n >= 1,
            FactValue::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Bool(b) => write!(f, "{b}"),
            FactValue::Number(n) => write!(f, "{n}"),
            FactValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        FactValue::Bool(value)
    }
}

impl From<i64> for FactValue {
    fn from(value: i64) -> Self {
        FactValue::count(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        FactValue::Text(value.to_string())
    }
}

/// Flat snapshot of world and agent state keyed by dotted names
/// (`inventory.iron_ingot`, `nearby_workbench`, `equipment.mainhand`).
///
/// Ordered so that equal tables hash and serialize identically; the planner uses the
/// table itself as its visited-set signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactTable {
    facts: BTreeMap<String, FactValue>,
}

impl FactTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FactValue> {
        self.facts.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.facts.contains_key(key)
    }

    /// Numeric value of `key`, if present and numeric.
    pub fn number(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FactValue::as_number)
    }

    /// Numeric value of `key`, treating absence as zero.
    pub fn count(&self, key: &str) -> i64 {
        self.number(key).unwrap_or(0)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(FactValue::as_bool)
    }

    /// Insert a fact. Numbers are clamped to zero.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FactValue>) {
        let value = match value.into() {
            FactValue::Number(n) => FactValue::count(n),
            other => other,
        };
        self.facts.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactValue)> {
        self.facts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }

    pub(crate) fn clamp_counts(&mut self) {
        for value in self.facts.values_mut() {
            if let FactValue::Number(n) = value {
                if *n < 0 {
                    *n = 0;
                }
            }
        }
    }

    pub(crate) fn raw_mut(&mut self) -> &mut BTreeMap<String, FactValue> {
        &mut self.facts
    }
}

impl<K: Into<String>, V: Into<FactValue>> FromIterator<(K, V)> for FactTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = FactTable::new();
        for (k, v) in iter {
            table.set(k, v);
        }
        table
    }
}
