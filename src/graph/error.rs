//! Errors raised by the graph model

use thiserror::Error;

/// Data errors in graph records
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("relationship chain revisits '{link}' (chain so far: {chain:?})")]
    ChainCycle { link: String, chain: Vec<String> },

    #[error("relationship chain longer than {max} links: {chain:?}")]
    ChainTooLong { max: usize, chain: Vec<String> },

    #[error("edge has no relationship")]
    EmptyRelationship,

    #[error("invalid node URI: {0}")]
    InvalidUri(String),

    #[error("invalid timestamp '{0}', expected YYYY-MM-DDTHH:MM:SSZ")]
    InvalidTimestamp(String),
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
