use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Condition, DomainError, Effect, FactTable, PlanStep};

/// Declarative action: what must hold, what changes, what it costs, and which skill runs it.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,

    #[serde(default)]
    pub preconditions: BTreeMap<String, Condition>,

    #[serde(default)]
    pub effects: BTreeMap<String, Effect>,

    /// Non-negative and finite; anything else loads as `1`.
    #[serde(default = "default_cost", deserialize_with = "deserialize_cost")]
    pub cost: f64,

    /// Skill identifier. `None` marks a pure goal step that needs no execution.
    #[serde(default)]
    pub skill: Option<String>,

    #[serde(default)]
    pub params: serde_json::Value,
}

fn default_cost() -> f64 {
    1.0
}

fn sanitize_cost(cost: f64) -> f64 {
    if cost.is_finite() && cost >= 0.0 {
        cost
    } else {
        default_cost()
    }
}

fn deserialize_cost<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_f64().map(sanitize_cost).unwrap_or_else(default_cost))
}

impl ActionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preconditions: BTreeMap::new(),
            effects: BTreeMap::new(),
            cost: default_cost(),
            skill: None,
            params: serde_json::Value::Null,
        }
    }

    pub fn with_precondition(mut self, key: impl Into<String>, condition: Condition) -> Self {
        self.preconditions.insert(key.into(), condition);
        self
    }

    pub fn with_effect(mut self, key: impl Into<String>, effect: Effect) -> Self {
        self.effects.insert(key.into(), effect);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = sanitize_cost(cost);
        self
    }

    pub fn with_skill(mut self, skill: impl Into<String>, params: serde_json::Value) -> Self {
        self.skill = Some(skill.into());
        self.params = params;
        self
    }

    pub fn is_applicable(&self, state: &FactTable) -> bool {
        crate::are_preconditions_satisfied(&self.preconditions, state)
    }

    pub fn to_step(&self) -> PlanStep {
        PlanStep {
            action: self.name.clone(),
            skill: self.skill.clone(),
            params: self.params.clone(),
            cost: self.cost,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DomainFile {
    Wrapped { actions: Vec<ActionDef> },
    Bare(Vec<ActionDef>),
}

/// Ordered, immutable set of action definitions.
#[derive(Debug, Clone, Default)]
pub struct ActionDomain {
    actions: Vec<ActionDef>,
    by_name: HashMap<String, usize>,
}

impl ActionDomain {
    pub fn new(actions: Vec<ActionDef>) -> Result<Self, DomainError> {
        if actions.is_empty() {
            return Err(DomainError::Empty);
        }

        let mut by_name = HashMap::with_capacity(actions.len());
        for (idx, action) in actions.iter().enumerate() {
            if action.name.trim().is_empty() {
                return Err(DomainError::UnnamedAction);
            }
            if by_name.insert(action.name.clone(), idx).is_some() {
                return Err(DomainError::DuplicateAction(action.name.clone()));
            }
        }

        Ok(Self { actions, by_name })
    }

    /// Accepts either a bare array of actions or `{ "actions": [...] }`.
    pub fn from_json_str(json: &str) -> Result<Self, DomainError> {
        let actions = match serde_json::from_str::<DomainFile>(json)? {
            DomainFile::Wrapped { actions } | DomainFile::Bare(actions) => actions,
        };
        Self::new(actions)
    }

    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let content = std::fs::read_to_string(path).map_err(|source| DomainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn actions(&self) -> &[ActionDef] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ActionDef> {
        self.by_name.get(name).map(|&idx| &self.actions[idx])
    }

    /// Distinct skill identifiers referenced by the domain, in first-use order.
    pub fn skills(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.actions
            .iter()
            .filter_map(|a| a.skill.as_deref())
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Whether any action's effects mention `key`.
    pub fn produces(&self, key: &str) -> bool {
        self.actions.iter().any(|a| a.effects.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_wrapped_and_bare_domains() {
        let bare = r#"[{"name": "gather_log", "effects": {"inventory.oak_log": "+1"}, "skill": "collect"}]"#;
        let wrapped = format!(r#"{{"actions": {bare}}}"#);

        let a = ActionDomain::from_json_str(bare).unwrap();
        let b = ActionDomain::from_json_str(&wrapped).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.actions(), b.actions());
        assert_eq!(a.get("gather_log").unwrap().cost, 1.0);
        assert_eq!(a.skills(), vec!["collect"]);
    }

    #[test]
    fn invalid_costs_fall_back_to_one() {
        let domain = ActionDomain::from_json_str(
            r#"[{"name": "a", "cost": -3}, {"name": "b", "cost": "cheap"}, {"name": "c", "cost": 2.5}]"#,
        )
        .unwrap();
        assert_eq!(domain.get("a").unwrap().cost, 1.0);
        assert_eq!(domain.get("b").unwrap().cost, 1.0);
        assert_eq!(domain.get("c").unwrap().cost, 2.5);
    }

    #[test]
    fn rejects_empty_and_duplicate_domains() {
        assert!(matches!(
            ActionDomain::from_json_str("[]"),
            Err(DomainError::Empty)
        ));
        assert!(matches!(
            ActionDomain::from_json_str(r#"[{"name": "a"}, {"name": "a"}]"#),
            Err(DomainError::DuplicateAction(name)) if name == "a"
        ));
        assert!(matches!(
            ActionDomain::from_json_str(r#"[{"name": "a", "effects": {"x": "+many"}}]"#),
            Err(DomainError::Parse(_))
        ));
    }
}
