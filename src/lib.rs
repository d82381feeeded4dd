//! threatgraph: threat-intelligence knowledge graph orchestration
//!
//! Builds and queries a knowledge graph of indicators (IPs, domains,
//! malware families, classifications) by orchestrating pluggable
//! components.
//!
//! # Core Concepts
//!
//! - **Enrichments** turn a topic into a graph fragment
//! - **Storage interfaces** persist merged graphs and answer bounded queries
//! - **Scorers** rank the nodes of a queried subgraph against a topic
//! - **Catalog** records each component's category, inputs, cost, speed and
//!   whether it configured successfully
//!
//! # Example
//!
//! ```no_run
//! use threatgraph::{
//!     CancellationToken, Component, EnrichmentRequest, MemoryStorage, Orchestrator, Selection,
//!     TldEnrichment,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut orchestrator = Orchestrator::new();
//! orchestrator.register(Component::enrichment(TldEnrichment::default())).await?;
//! orchestrator.register(Component::storage(MemoryStorage::default())).await?;
//! orchestrator.set_interface("memory")?;
//!
//! let request = EnrichmentRequest::new("mail.example.org", "domain");
//! let cancel = CancellationToken::new();
//! let graph = orchestrator.run_enrichments(&request, &Selection::new(), &cancel).await?;
//! orchestrator.store_graph(&graph, None, &cancel).await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod component;
pub mod config;
pub mod enrichments;
pub mod graph;
pub mod orchestrator;
pub mod query;
pub mod scoring;
pub mod storage;

pub use catalog::{Catalog, CatalogEntry, CatalogError, ComponentCategory, Selection};
pub use component::{
    CancellationToken, Component, ComponentError, Enrichment, EnrichmentRequest, QueryRequest,
    Scorer, Scores, StorageInterface,
};
pub use config::{ConfigError, ThreatGraphConfig};
pub use enrichments::{FeedSource, LookupEnrichment, TldEnrichment};
pub use graph::{Edge, Graph, GraphError, Node, NodeUri, PropertyValue};
pub use orchestrator::{
    EnrichmentRun, Orchestrator, OrchestratorError, OrchestratorResult, OrchestratorSettings,
};
pub use query::{BoundedTraversal, QueryEngine};
pub use scoring::TopicDistanceScorer;
pub use storage::{MemoryStorage, SqliteStorage, StorageError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
