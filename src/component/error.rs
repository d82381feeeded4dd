use crate::graph::GraphError;
use thiserror::Error;

/// Errors raised inside component calls
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("configuration failed: {0}")]
    Configuration(String),

    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("component cancelled")]
    Cancelled,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type ComponentResult<T> = Result<T, ComponentError>;
