//! Topic-distance scorer

use crate::component::{
    CancellationToken, ComponentError, ComponentResult, InterfaceConfiguration, Scorer, Scores,
};
use crate::graph::Graph;
use crate::query::BoundedTraversal;
use async_trait::async_trait;

/// Scores a node `1 / (1 + d)` where `d` is its distance from the topic.
///
/// Distances come from the `topic_distance` stamps a query leaves on the
/// subgraph. Unstamped subgraphs are measured here with an unrestricted
/// traversal from the topic nodes. Nodes unreachable from the topic score
/// `0.0`.
pub struct TopicDistanceScorer {
    name: String,
}

impl Default for TopicDistanceScorer {
    fn default() -> Self {
        Self::new("topic-distance")
    }
}

impl TopicDistanceScorer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

fn distance_score(distance: usize) -> f64 {
    1.0 / (1.0 + distance as f64)
}

#[async_trait]
impl Scorer for TopicDistanceScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self) -> ComponentResult<InterfaceConfiguration> {
        Ok(InterfaceConfiguration {
            configured: true,
            description: "Inverse hop distance from the topic".to_string(),
            cost: 1,
            speed: 1,
        })
    }

    async fn score(
        &self,
        subgraph: &Graph,
        topic: &Graph,
        cancel: &CancellationToken,
    ) -> ComponentResult<Scores> {
        if cancel.is_cancelled() {
            return Err(ComponentError::Cancelled);
        }

        let stamped = subgraph.nodes().all(|n| n.topic_distance().is_some());
        let measured;
        let graph = if stamped {
            subgraph
        } else {
            measured = BoundedTraversal::new(subgraph.node_count()).execute(subgraph, topic);
            &measured
        };

        Ok(subgraph
            .nodes()
            .map(|n| {
                let score = graph
                    .get_node(&n.uri)
                    .and_then(|m| m.topic_distance())
                    .map(distance_score)
                    .unwrap_or(0.0);
                (n.uri.clone(), score)
            })
            .collect())
    }
}
