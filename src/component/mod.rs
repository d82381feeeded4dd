//! Component adapter contract
//!
//! Enrichments, storage interfaces and scorers plug into the orchestrator
//! through the traits here. Each reports its capabilities from `configure`
//! and receives a [`CancellationToken`] on every call.

mod cancel;
mod error;
mod traits;
mod types;

pub use cancel::CancellationToken;
pub use error::{ComponentError, ComponentResult};
pub use traits::{Component, Enrichment, Scorer, Scores, StorageInterface};
pub use types::{
    EnrichmentConfiguration, EnrichmentRequest, InterfaceConfiguration, QueryRequest,
    DEFAULT_DONT_FOLLOW, DEFAULT_MAX_DEPTH,
};
