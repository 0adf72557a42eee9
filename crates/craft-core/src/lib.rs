//! Fact tables, conditions, effects and action domains for goal-directed agents.
//!
//! Everything here is pure data and pure functions: the planner and the executor in the
//! other crates share these so that a plan is always re-checked with the same predicate
//! that produced it.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod action;
pub mod condition;
pub mod effect;
pub mod error;
pub mod fact;
pub mod plan;
pub mod schema;

pub use action::{ActionDef, ActionDomain};
pub use condition::{
    analyse_preconditions, are_preconditions_satisfied, evaluate, CompareOp, Condition,
    PreconditionAnalysis, PreconditionStatus,
};
pub use effect::{apply_effects, Effect};
pub use error::{DomainError, ParseError, SchemaError};
pub use fact::{FactTable, FactValue};
pub use plan::{PlanSpec, PlanStep};
pub use schema::{is_environmental, FactSpec, Observation, StateSchema};
