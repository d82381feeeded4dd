//! Query engine: bounded subgraph retrieval and scoring

use super::traverse::BoundedTraversal;
use crate::component::{CancellationToken, QueryRequest, Scores};
use crate::graph::Graph;
use crate::orchestrator::{Orchestrator, OrchestratorResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs queries and scoring through the orchestrator's active components
pub struct QueryEngine {
    orchestrator: Arc<Orchestrator>,
}

impl QueryEngine {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Ask the given or active storage interface for the subgraph around
    /// `request.topic`.
    ///
    /// The backend's answer is trimmed to the contract before it is
    /// returned: nodes without a `topic_distance` or beyond `max_depth` are
    /// dropped, as are edges in a `dont_follow` category and edges left
    /// without both endpoints.
    pub async fn run_query(
        &self,
        request: &QueryRequest,
        storage_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Graph> {
        let (name, interface) = self.orchestrator.resolve_storage(storage_name)?;
        let mut subgraph = self
            .orchestrator
            .call(
                &name,
                self.orchestrator.settings().storage_timeout,
                cancel,
                interface.query(request, cancel),
            )
            .await?;

        let before = (subgraph.node_count(), subgraph.edge_count());
        enforce_contract(&mut subgraph, request);
        let after = (subgraph.node_count(), subgraph.edge_count());
        if before != after {
            warn!(
                interface = %name,
                dropped_nodes = before.0 - after.0,
                dropped_edges = before.1 - after.1,
                "storage query exceeded its bounds"
            );
        }
        debug!(interface = %name, nodes = after.0, edges = after.1, "query complete");
        Ok(subgraph)
    }

    /// Score every node of `subgraph` with the given or active scorer.
    ///
    /// Nodes the scorer leaves out score `0.0`; scores for nodes outside
    /// `subgraph` are discarded.
    pub async fn score_subgraph(
        &self,
        topic: &Graph,
        subgraph: &Graph,
        scoring_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Scores> {
        let (name, scorer) = self.orchestrator.resolve_scoring(scoring_name)?;
        let raw = self
            .orchestrator
            .call(
                &name,
                self.orchestrator.settings().scoring_timeout,
                cancel,
                scorer.score(subgraph, topic, cancel),
            )
            .await?;

        let scores: Scores = subgraph
            .nodes()
            .map(|n| (n.uri.clone(), raw.get(&n.uri).copied().unwrap_or(0.0)))
            .collect();
        debug!(scorer = %name, scored = scores.len(), "scoring complete");
        Ok(scores)
    }
}

fn enforce_contract(subgraph: &mut Graph, request: &QueryRequest) {
    subgraph.retain_nodes(|n| n.topic_distance().is_some_and(|d| d <= request.max_depth));

    let traversal = BoundedTraversal::from_request(request);
    let snapshot = subgraph.clone();
    subgraph.retain_edges(|e| {
        match (snapshot.get_node(&e.source_uri), snapshot.get_node(&e.dest_uri)) {
            (Some(source), Some(dest)) => traversal.keeps_edge(e, source, dest),
            _ => false,
        }
    });
}
