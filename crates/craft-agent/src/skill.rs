//! Skill trait and registry.
//!
//! An action definition names its skill by string; the executor resolves names against a
//! [`SkillRegistry`] once, at construction, so the planner never depends on how a skill is
//! carried out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// An effectful operation the executor can run for a plan step.
///
/// Errors are not fatal: the executor treats them as a replan trigger.
#[async_trait]
pub trait Skill<W: ?Sized + Sync>: Send + Sync {
    async fn invoke(&self, world: &W, params: &Value) -> anyhow::Result<()>;
}

pub struct SkillRegistry<W: ?Sized + Sync> {
    skills: HashMap<String, Arc<dyn Skill<W>>>,
}

impl<W: ?Sized + Sync> Default for SkillRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: ?Sized + Sync> SkillRegistry<W> {
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Register a skill. Replaces any existing skill with the same name.
    pub fn register(&mut self, name: impl Into<String>, skill: impl Skill<W> + 'static) {
        self.skills.insert(name.into(), Arc::new(skill));
    }

    pub fn with(mut self, name: impl Into<String>, skill: impl Skill<W> + 'static) -> Self {
        self.register(name, skill);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill<W>>> {
        self.skills.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    /// Sorted skill names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.skills.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
