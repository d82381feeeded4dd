//! In-process storage interface

use super::error::{StorageError, StorageResult};
use crate::component::{
    CancellationToken, ComponentResult, InterfaceConfiguration, QueryRequest, StorageInterface,
};
use crate::graph::{Graph, TOPIC_DISTANCE};
use crate::query::BoundedTraversal;
use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

/// Storage interface backed by a single in-memory [`Graph`]
///
/// Contents are lost when the process exits.
pub struct MemoryStorage {
    name: String,
    graph: RwLock<Graph>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: RwLock::new(Graph::new()),
        }
    }

    /// Copy of everything stored so far
    pub fn snapshot(&self) -> Graph {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Merge `fragment` only if every edge has both endpoints in the
    /// fragment or the store.
    fn merge(&self, fragment: &Graph) -> StorageResult<()> {
        let mut stored = self.graph.write().unwrap_or_else(PoisonError::into_inner);

        for edge in fragment.edges() {
            for endpoint in [&edge.source_uri, &edge.dest_uri] {
                if !fragment.contains_node(endpoint) && !stored.contains_node(endpoint) {
                    return Err(StorageError::DanglingEdge {
                        edge: edge.uri.to_string(),
                        missing: endpoint.to_string(),
                    });
                }
            }
        }

        let mut incoming = fragment.clone();
        strip_query_annotations(&mut incoming);
        stored.merge(incoming);
        Ok(())
    }
}

/// Query results carry `topic_distance`; it is never persisted.
pub(crate) fn strip_query_annotations(graph: &mut Graph) {
    graph.remove_node_property(TOPIC_DISTANCE);
}

#[async_trait]
impl StorageInterface for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self) -> ComponentResult<InterfaceConfiguration> {
        Ok(InterfaceConfiguration {
            configured: true,
            description: "In-memory graph store".to_string(),
            cost: 1,
            speed: 1,
        })
    }

    async fn enrich(&self, graph: &Graph, cancel: &CancellationToken) -> ComponentResult<()> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled.into_write_error());
        }
        self.merge(graph).map_err(StorageError::into_write_error)
    }

    async fn query(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> ComponentResult<Graph> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled.into_query_error());
        }
        let stored = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        Ok(BoundedTraversal::from_request(request).execute(&stored, &request.topic))
    }
}
