use std::path::PathBuf;

use thiserror::Error;

/// Invalid condition or effect literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty condition")]
    EmptyCondition,

    #[error("invalid comparator `{0}`")]
    InvalidComparator(String),

    #[error("empty effect")]
    EmptyEffect,

    #[error("invalid delta `{0}`")]
    InvalidDelta(String),
}

/// Failure loading an action domain. Fatal at startup.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("failed to read action domain from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse action domain: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("action domain is empty")]
    Empty,

    #[error("duplicate action `{0}`")]
    DuplicateAction(String),

    #[error("action with an empty name")]
    UnnamedAction,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read state schema from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state schema: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("computed fact `{0}` declares no dependencies")]
    CompositeWithoutDependencies(String),

    #[error("computed fact `{0}` must not declare a default")]
    CompositeWithDefault(String),
}
