use crate::catalog::CatalogError;
use thiserror::Error;

/// Errors surfaced by the orchestrator and query engine
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("storage interface '{0}' is not a configured storage interface")]
    InterfaceNotConfigured(String),

    #[error("scoring plugin '{0}' is not configured")]
    ScoringPluginNotConfigured(String),

    #[error("no storage interface configured")]
    NoStorageConfigured,

    #[error("component not found: {0}")]
    ComponentNotFound(String),

    #[error("storage write to '{name}' failed: {reason}")]
    StorageWrite { name: String, reason: String },

    #[error("component '{name}' failed: {reason}")]
    ComponentInvocation { name: String, reason: String },

    #[error("component '{name}' timed out after {seconds}s")]
    Timeout { name: String, seconds: u64 },

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
