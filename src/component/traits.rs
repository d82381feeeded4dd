//! Capability traits the pluggable components implement

use super::cancel::CancellationToken;
use super::error::ComponentResult;
use super::types::{EnrichmentConfiguration, EnrichmentRequest, InterfaceConfiguration, QueryRequest};
use crate::catalog::ComponentCategory;
use crate::graph::{Graph, NodeUri};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Node URI to score, as produced by a [`Scorer`]
pub type Scores = BTreeMap<NodeUri, f64>;

/// A source that turns a topic into a graph fragment.
///
/// `run` must be idempotent for the same topic and must not touch storage.
#[async_trait]
pub trait Enrichment: Send + Sync {
    /// Catalog name, unique across all components
    fn name(&self) -> &str;

    async fn configure(&self) -> ComponentResult<EnrichmentConfiguration>;

    async fn run(
        &self,
        request: &EnrichmentRequest,
        cancel: &CancellationToken,
    ) -> ComponentResult<Graph>;
}

/// A persistent graph store.
#[async_trait]
pub trait StorageInterface: Send + Sync {
    fn name(&self) -> &str;

    async fn configure(&self) -> ComponentResult<InterfaceConfiguration>;

    /// Merge `graph` into the store, all or nothing.
    ///
    /// Nodes merge by URI keeping the earliest start and latest finish.
    /// Edges are unioned by URI. Fails with `StorageWrite` without applying
    /// any part of the graph.
    async fn enrich(&self, graph: &Graph, cancel: &CancellationToken) -> ComponentResult<()>;

    /// Subgraph within `max_depth` hops of the topic nodes.
    ///
    /// Every returned node carries `topic_distance`.
    async fn query(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> ComponentResult<Graph>;
}

/// Scores nodes of a queried subgraph against a topic.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    async fn configure(&self) -> ComponentResult<InterfaceConfiguration>;

    async fn score(
        &self,
        subgraph: &Graph,
        topic: &Graph,
        cancel: &CancellationToken,
    ) -> ComponentResult<Scores>;
}

/// A registrable component of any category
#[derive(Clone)]
pub enum Component {
    Enrichment(Arc<dyn Enrichment>),
    Storage(Arc<dyn StorageInterface>),
    Scoring(Arc<dyn Scorer>),
}

impl Component {
    pub fn enrichment(component: impl Enrichment + 'static) -> Self {
        Component::Enrichment(Arc::new(component))
    }

    pub fn storage(component: impl StorageInterface + 'static) -> Self {
        Component::Storage(Arc::new(component))
    }

    pub fn scoring(component: impl Scorer + 'static) -> Self {
        Component::Scoring(Arc::new(component))
    }

    pub fn name(&self) -> &str {
        match self {
            Component::Enrichment(c) => c.name(),
            Component::Storage(c) => c.name(),
            Component::Scoring(c) => c.name(),
        }
    }

    pub fn category(&self) -> ComponentCategory {
        match self {
            Component::Enrichment(_) => ComponentCategory::Enrichment,
            Component::Storage(_) => ComponentCategory::StorageInterface,
            Component::Scoring(_) => ComponentCategory::Scoring,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("category", &self.category())
            .finish()
    }
}
