//! Craft agent runtime.
//!
//! Binds a [`craft_goap::Planner`] to a live [`World`]: the [`Executor`] runs plans step by
//! step and replans on drift, and the [`GoalResolver`] decomposes goals the planner cannot
//! reach in one search into subgoals. Both honour a [`CancellationToken`] at every step and
//! recursion level.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod agent;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod resolver;
pub mod skill;
pub mod world;

pub use agent::Agent;
pub use config::{AgentConfig, ExecutorConfig, ResolverConfig};
pub use driver::plan_cooperative;
pub use error::{ExecutorError, ResolveError};
pub use executor::{ExecutionReport, Executor};
pub use resolver::{GoalResolver, ResolveReport};
pub use skill::{Skill, SkillRegistry};
pub use world::World;
