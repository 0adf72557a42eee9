//! Agent configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use craft_goap::PlannerConfig;
use serde::{Deserialize, Serialize};

/// Full agent configuration, usually loaded from `craft.yaml`.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Search bounds and resource caps
    pub planner: PlannerConfig,

    /// Recursive decomposition bounds
    pub resolver: ResolverConfig,

    /// Reactive execution bounds
    pub executor: ExecutorConfig,
}

/// Recursive decomposition configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Recursion depth at which resolution stops; the top-level goal is depth 0.
    pub max_depth: usize,

    /// Planning attempts per level before giving up with `SearchExhausted`.
    pub max_attempts_per_level: usize,

    /// On failure of `key:N` with N > 1, try `key:1` first.
    pub reduce_to_one: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_attempts_per_level: 8,
            reduce_to_one: true,
        }
    }
}

/// Reactive execution configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Replans allowed for one `execute` call. `None` leaves cancellation as the only stop.
    pub max_replans: Option<u32>,
}

impl AgentConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
