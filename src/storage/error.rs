use crate::component::ComponentError;
use crate::graph::GraphError;
use thiserror::Error;

/// Errors that can occur inside the reference storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("edge {edge} references missing node {missing}")]
    DanglingEdge { edge: String, missing: String },

    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Map a failed `enrich` onto the component contract
    pub(crate) fn into_write_error(self) -> ComponentError {
        match self {
            StorageError::Cancelled => ComponentError::Cancelled,
            other => ComponentError::StorageWrite(other.to_string()),
        }
    }

    /// Map a failed `query` onto the component contract
    pub(crate) fn into_query_error(self) -> ComponentError {
        match self {
            StorageError::Cancelled => ComponentError::Cancelled,
            StorageError::Graph(e) => ComponentError::Graph(e),
            other => ComponentError::Invocation(other.to_string()),
        }
    }
}
