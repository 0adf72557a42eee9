//! Diagnostic sinks for planning and execution.
//!
//! A sink is passed explicitly into each planning call and lives only for that call; there
//! is no process-wide logger. [`TracingSink`] bridges events into `tracing`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{
    emit_shared, NullTraceSink, SharedTraceSink, TraceEvent, TraceLog, TraceSink, TracingSink,
    VecTraceSink,
};
