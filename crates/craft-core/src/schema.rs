//! State schema, raw observations, and the composite-fact resolver.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{FactTable, FactValue, SchemaError};

/// Declaration of one fact key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactSpec {
    /// Value used when an observation does not mention the key.
    #[serde(default)]
    pub default: Option<FactValue>,

    /// How the host detects the fact (`inventory`, `environment`, `equipment`, ...).
    /// Informational only.
    #[serde(default)]
    pub detection: Option<String>,

    /// Derived fact: `true` iff any key in `depends_on` is present.
    #[serde(default)]
    pub computed: bool,

    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl FactSpec {
    pub fn composite(depends_on: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            computed: true,
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_default(default: impl Into<FactValue>) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSchema {
    facts: BTreeMap<String, FactSpec>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fact(mut self, key: impl Into<String>, spec: FactSpec) -> Self {
        self.facts.insert(key.into(), spec);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for (key, spec) in &self.facts {
            if !spec.computed {
                continue;
            }
            if spec.depends_on.is_empty() {
                return Err(SchemaError::CompositeWithoutDependencies(key.clone()));
            }
            if spec.default.is_some() {
                return Err(SchemaError::CompositeWithDefault(key.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&FactSpec> {
        self.facts.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.facts.contains_key(key)
    }

    pub fn is_composite(&self, key: &str) -> bool {
        self.facts.get(key).is_some_and(|spec| spec.computed)
    }

    /// Dependency alternatives of a composite fact.
    pub fn dependencies(&self, key: &str) -> Option<&[String]> {
        self.facts
            .get(key)
            .filter(|spec| spec.computed)
            .map(|spec| spec.depends_on.as_slice())
    }

    pub fn composites(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.facts
            .iter()
            .filter(|(_, spec)| spec.computed)
            .map(|(key, spec)| (key.as_str(), spec.depends_on.as_slice()))
    }

    /// Recompute every composite fact in place.
    ///
    /// Composites may depend on other composites, so this iterates to a fixpoint. Running
    /// it twice in a row never changes the table.
    pub fn resolve_composites(&self, table: &mut FactTable) {
        let composite_count = self.composites().count();
        for _ in 0..=composite_count {
            let mut changed = false;
            for (key, deps) in self.composites() {
                let value = deps
                    .iter()
                    .any(|dep| table.get(dep).is_some_and(FactValue::is_present));
                if table.flag(key) != Some(value) {
                    table.set(key, value);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Build a fresh fact table from a raw observation.
    ///
    /// Order: schema defaults, then observed values, then composites.
    pub fn build_state(&self, observation: &Observation) -> FactTable {
        let mut table = FactTable::new();
        for (key, spec) in &self.facts {
            if let Some(default) = spec.default.as_ref() {
                table.set(key.clone(), default.clone());
            }
        }

        for (item, count) in &observation.inventory {
            table.set(format!("inventory.{item}"), *count);
        }
        for (flag, value) in &observation.environment {
            table.set(flag.clone(), *value);
        }
        for (slot, item) in &observation.equipment {
            table.set(format!("equipment.{slot}"), item.as_str());
        }
        if let Some(is_day) = observation.is_day {
            table.set("is_day", is_day);
            table.set("is_night", !is_day);
        }
        for (key, value) in &observation.facts {
            table.set(key.clone(), value.clone());
        }

        self.resolve_composites(&mut table);
        table
    }
}

/// One sample of the world as seen by an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    /// Item counts, keyed by item name (`oak_log`).
    pub inventory: BTreeMap<String, i64>,
    /// Perception flags, keyed verbatim (`nearby_workbench`, `visible_iron_ore`).
    pub environment: BTreeMap<String, bool>,
    /// Equipped item per slot (`mainhand`).
    pub equipment: BTreeMap<String, String>,
    pub is_day: Option<bool>,
    /// Any other world flags, keyed verbatim.
    pub facts: BTreeMap<String, FactValue>,
}

impl Observation {
    pub fn with_item(mut self, item: impl Into<String>, count: i64) -> Self {
        self.inventory.insert(item.into(), count);
        self
    }

    pub fn with_environment(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.environment.insert(flag.into(), value);
        self
    }
}

/// Keys that depend on transient perception and cannot be produced by a plan.
pub fn is_environmental(key: &str) -> bool {
    const PREFIXES: [&str; 4] = ["nearby_", "nearby.", "visible_", "visible."];
    PREFIXES.iter().any(|p| key.starts_with(p)) || key == "is_day" || key == "is_night"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> StateSchema {
        StateSchema::new()
            .with_fact("inventory.oak_log", FactSpec::with_default(0i64))
            .with_fact("nearby_workbench", FactSpec::with_default(false))
            .with_fact(
                "has_pickaxe",
                FactSpec::composite(["inventory.wooden_pickaxe", "inventory.stone_pickaxe"]),
            )
            .with_fact("can_mine_stone", FactSpec::composite(["has_pickaxe"]))
    }

    #[test]
    fn build_state_applies_defaults_observation_and_composites() {
        let mut obs = Observation::default()
            .with_item("stone_pickaxe", 1)
            .with_item("dirt", -4);
        obs.is_day = Some(false);

        let state = schema().build_state(&obs);
        assert_eq!(state.number("inventory.oak_log"), Some(0));
        assert_eq!(state.number("inventory.dirt"), Some(0));
        assert_eq!(state.flag("nearby_workbench"), Some(false));
        assert_eq!(state.flag("has_pickaxe"), Some(true));
        assert_eq!(state.flag("can_mine_stone"), Some(true));
        assert_eq!(state.flag("is_night"), Some(true));
    }

    #[test]
    fn rejects_composite_without_dependencies() {
        let err = StateSchema::from_json_str(r#"{"has_axe": {"computed": true}}"#).unwrap_err();
        assert!(matches!(err, SchemaError::CompositeWithoutDependencies(k) if k == "has_axe"));
    }

    #[test]
    fn environmental_keys() {
        assert!(is_environmental("nearby_workbench"));
        assert!(is_environmental("nearby.category.log"));
        assert!(is_environmental("visible_iron_ore"));
        assert!(is_environmental("is_night"));
        assert!(!is_environmental("inventory.nearby_thing"));
        assert!(!is_environmental("has_workbench"));
    }
}
