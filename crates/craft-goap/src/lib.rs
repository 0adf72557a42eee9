//! Deterministic forward A* planner over fact tables.
//!
//! Failure is a first-class result: when no plan is found the planner returns a
//! [`Diagnosis`] naming the unmet goal keys and, per candidate action, which
//! preconditions block it.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod diagnosis;
pub mod goal;
pub mod heuristic;
mod need;
pub mod planner;
pub mod relevance;

pub use diagnosis::{diagnose, Diagnosis, MissingRequirement, SearchFailure, Suggestion};
pub use goal::{Goal, GoalError, GoalSource};
pub use heuristic::UNREACHABLE;
pub use planner::{
    simulate_plan, PlanOutcome, Planner, PlannerConfig, ResourceCaps, Search, SearchStatus,
    SimulationError, StepAnalysis,
};
pub use relevance::relevant_actions;
