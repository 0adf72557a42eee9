use async_trait::async_trait;
use craft_core::Observation;

/// Source of fresh observations for one agent.
///
/// Implementations talk to the game, a simulator, or a recorded trace. The planner never
/// sees a `World`; only the executor and resolver sample it.
#[async_trait]
pub trait World: Send + Sync {
    async fn observe(&self) -> anyhow::Result<Observation>;
}
