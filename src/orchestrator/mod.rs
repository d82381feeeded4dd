//! Enrichment orchestration
//!
//! Selects candidate enrichments from the catalog, runs them in parallel,
//! merges their fragments and forwards graphs to the active storage
//! interface.

mod engine;
mod error;
mod report;

pub use engine::{Orchestrator, OrchestratorSettings};
pub use error::{OrchestratorError, OrchestratorResult};
pub use report::{ComponentOutcome, EnrichmentRun, OutcomeStatus};
