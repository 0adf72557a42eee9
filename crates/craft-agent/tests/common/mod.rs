#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use craft_agent::{Agent, AgentConfig, Skill, SkillRegistry, World};
use craft_core::{ActionDomain, Effect, FactSpec, FactValue, Observation, StateSchema};
use craft_trace::{SharedTraceSink, VecTraceSink};
use serde_json::Value;

pub const DOMAIN: &str = r#"[
    {"name": "gather_oak_log", "cost": 3,
     "preconditions": {"nearby_oak_tree": true},
     "effects": {"inventory.oak_log": "+1"},
     "skill": "act", "params": {"action": "gather_oak_log"}},
    {"name": "craft_oak_planks",
     "preconditions": {"inventory.oak_log": ">= 1"},
     "effects": {"inventory.oak_log": "-1", "inventory.oak_planks": "+4"},
     "skill": "act", "params": {"action": "craft_oak_planks"}},
    {"name": "craft_sticks",
     "preconditions": {"inventory.oak_planks": ">= 2"},
     "effects": {"inventory.oak_planks": "-2", "inventory.stick": "+4"},
     "skill": "act", "params": {"action": "craft_sticks"}},
    {"name": "craft_crafting_table",
     "preconditions": {"inventory.oak_planks": ">= 4"},
     "effects": {"inventory.oak_planks": "-4", "inventory.crafting_table": "+1"},
     "skill": "act", "params": {"action": "craft_crafting_table"}},
    {"name": "craft_wooden_pickaxe",
     "preconditions": {"has_workbench": true, "inventory.oak_planks": ">= 3", "inventory.stick": ">= 2"},
     "effects": {"inventory.oak_planks": "-3", "inventory.stick": "-2", "inventory.wooden_pickaxe": "+1"},
     "skill": "act", "params": {"action": "craft_wooden_pickaxe"}},
    {"name": "smelt_iron_ingot", "cost": 2,
     "preconditions": {"inventory.raw_iron": ">= 1", "nearby_furnace": true},
     "effects": {"inventory.raw_iron": "-1", "inventory.iron_ingot": "+1"},
     "skill": "act", "params": {"action": "smelt_iron_ingot"}}
]"#;

pub fn domain() -> Arc<ActionDomain> {
    Arc::new(ActionDomain::from_json_str(DOMAIN).unwrap())
}

pub fn schema() -> Arc<StateSchema> {
    Arc::new(
        StateSchema::new()
            .with_fact("inventory.oak_log", FactSpec::with_default(0i64))
            .with_fact("inventory.oak_planks", FactSpec::with_default(0i64))
            .with_fact("inventory.stick", FactSpec::with_default(0i64))
            .with_fact("has_workbench", FactSpec::composite(["inventory.crafting_table"]))
            .with_fact(
                "has_pickaxe",
                FactSpec::composite(["inventory.wooden_pickaxe", "inventory.stone_pickaxe"]),
            ),
    )
}

type Hook = Box<dyn FnOnce(&mut Observation) + Send>;

/// In-memory world. Skills apply the domain's own effects to the observation.
pub struct SimWorld {
    domain: Arc<ActionDomain>,
    observation: Mutex<Observation>,
    performed: Mutex<Vec<String>>,
    after: Mutex<HashMap<String, Hook>>,
    failures: Mutex<HashMap<String, usize>>,
    stalls: Mutex<Vec<String>>,
}

impl SimWorld {
    pub fn new(observation: Observation) -> Self {
        Self {
            domain: domain(),
            observation: Mutex::new(observation),
            performed: Mutex::new(Vec::new()),
            after: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            stalls: Mutex::new(Vec::new()),
        }
    }

    /// Oak tree in reach, empty inventory.
    pub fn forest() -> Self {
        Self::new(Observation::default().with_environment("nearby_oak_tree", true))
    }

    /// Run `hook` on the observation once, right after `action` completes.
    pub fn after(&self, action: &str, hook: impl FnOnce(&mut Observation) + Send + 'static) {
        self.after.lock().unwrap().insert(action.to_string(), Box::new(hook));
    }

    /// Make the next `times` invocations of `action` fail without touching the world.
    pub fn fail(&self, action: &str, times: usize) {
        self.failures.lock().unwrap().insert(action.to_string(), times);
    }

    /// Make `action` never complete.
    pub fn stall(&self, action: &str) {
        self.stalls.lock().unwrap().push(action.to_string());
    }

    pub fn count(&self, item: &str) -> i64 {
        self.observation
            .lock()
            .unwrap()
            .inventory
            .get(item)
            .copied()
            .unwrap_or(0)
    }

    pub fn performed(&self) -> Vec<String> {
        self.performed.lock().unwrap().clone()
    }

    fn should_fail(&self, action: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(action) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    fn apply(&self, action: &str) -> anyhow::Result<()> {
        let def = self
            .domain
            .get(action)
            .ok_or_else(|| anyhow::anyhow!("no such action: {action}"))?;
        let mut obs = self.observation.lock().unwrap();
        for (key, effect) in &def.effects {
            if let Some(item) = key.strip_prefix("inventory.") {
                let current = obs.inventory.get(item).copied().map(FactValue::Number);
                let next = effect.apply_to(current.as_ref()).as_number().unwrap_or(0);
                obs.inventory.insert(item.to_string(), next);
            } else if let Effect::Bool(value) = effect {
                obs.facts.insert(key.clone(), FactValue::Bool(*value));
            }
        }
        if let Some(hook) = self.after.lock().unwrap().remove(action) {
            hook(&mut *obs);
        }
        self.performed.lock().unwrap().push(action.to_string());
        Ok(())
    }
}

#[async_trait]
impl World for SimWorld {
    async fn observe(&self) -> anyhow::Result<Observation> {
        Ok(self.observation.lock().unwrap().clone())
    }
}

/// Performs the action named in the step's params.
pub struct Act;

#[async_trait]
impl Skill<SimWorld> for Act {
    async fn invoke(&self, world: &SimWorld, params: &Value) -> anyhow::Result<()> {
        let action = params
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("missing `action` param"))?;
        let stalled = world.stalls.lock().unwrap().iter().any(|s| s == action);
        if stalled {
            std::future::pending::<()>().await;
        }
        if world.should_fail(action) {
            anyhow::bail!("{action} was interrupted");
        }
        world.apply(action)
    }
}

pub fn skills() -> SkillRegistry<SimWorld> {
    SkillRegistry::new().with("act", Act)
}

/// Trace sink the test keeps a handle to.
pub fn recorder() -> (SharedTraceSink, Arc<Mutex<VecTraceSink>>) {
    let recorder = Arc::new(Mutex::new(VecTraceSink::default()));
    let shared: SharedTraceSink = recorder.clone();
    (shared, recorder)
}

pub fn subjects(recorder: &Mutex<VecTraceSink>, tag: &str) -> Vec<String> {
    recorder
        .lock()
        .unwrap()
        .tagged(tag)
        .map(|e| e.subject.clone())
        .collect()
}

pub fn agent(world: Arc<SimWorld>, config: &AgentConfig, trace: Option<SharedTraceSink>) -> Agent<SimWorld> {
    Agent::new(domain(), schema(), skills(), world, config, trace).unwrap()
}

/// Planner budget small enough that multi-step tools need decomposition.
pub fn tight_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.planner.max_iterations = 4;
    config
}
