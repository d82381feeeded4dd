//! Bounded multi-source traversal over an in-memory graph
//!
//! Storage interfaces that can load their contents (or a neighbourhood of
//! them) as a [`Graph`] use this to satisfy the query contract.

use crate::component::QueryRequest;
use crate::graph::{Edge, Graph, Node, NodeUri};
use std::collections::{BTreeSet, HashMap};

/// Multi-source BFS from every topic node, following edges both ways
#[derive(Debug, Clone)]
pub struct BoundedTraversal {
    /// Maximum hop count (0 = topic nodes only)
    pub max_depth: usize,
    /// Edge categories never traversed
    pub dont_follow: BTreeSet<String>,
}

impl BoundedTraversal {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            dont_follow: BTreeSet::new(),
        }
    }

    pub fn from_request(request: &QueryRequest) -> Self {
        Self {
            max_depth: request.max_depth,
            dont_follow: request.dont_follow.clone(),
        }
    }

    pub fn dont_follow<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dont_follow = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `edge` may be crossed towards `far`.
    ///
    /// An edge's categories are its relationship chain links plus the key
    /// of the node on the far side.
    pub fn can_cross(&self, edge: &Edge, far: &Node) -> bool {
        !self.dont_follow.contains(&far.key)
            && !edge.categories().any(|c| self.dont_follow.contains(c))
    }

    /// Whether an edge between two stamped result nodes is returned.
    ///
    /// It must be crossable from the nearer endpoint towards the farther
    /// one; between equidistant endpoints either direction will do.
    pub fn keeps_edge(&self, edge: &Edge, source: &Node, dest: &Node) -> bool {
        match (source.topic_distance(), dest.topic_distance()) {
            (Some(s), Some(d)) if s < d => self.can_cross(edge, dest),
            (Some(s), Some(d)) if d < s => self.can_cross(edge, source),
            (Some(_), Some(_)) => self.can_cross(edge, dest) || self.can_cross(edge, source),
            _ => false,
        }
    }

    /// Subgraph of `graph` within `max_depth` hops of `topic`'s nodes.
    ///
    /// Topic nodes missing from `graph` are skipped. Every returned node is
    /// stamped with its shortest distance from the nearest topic node.
    /// Returned edges join two returned nodes; see [`keeps_edge`](Self::keeps_edge).
    pub fn execute(&self, graph: &Graph, topic: &Graph) -> Graph {
        let index = EdgeIndex::build(graph);
        let mut distance: HashMap<&NodeUri, usize> = HashMap::new();

        let mut current_level: Vec<&Node> = Vec::new();
        for seed in topic.nodes() {
            if let Some(node) = graph.get_node(&seed.uri) {
                if distance.insert(&node.uri, 0).is_none() {
                    current_level.push(node);
                }
            }
        }

        for depth in 1..=self.max_depth {
            if current_level.is_empty() {
                break;
            }
            let mut next_level = Vec::new();
            for node in &current_level {
                for edge in index.incident(&node.uri) {
                    let Some(far_uri) = edge.other_end(&node.uri) else {
                        continue;
                    };
                    if distance.contains_key(far_uri) {
                        continue;
                    }
                    let Some(far) = graph.get_node(far_uri) else {
                        continue;
                    };
                    if !self.can_cross(edge, far) {
                        continue;
                    }
                    distance.insert(&far.uri, depth);
                    next_level.push(far);
                }
            }
            current_level = next_level;
        }

        let mut result = Graph::new();
        for node in graph.nodes() {
            if let Some(&d) = distance.get(&node.uri) {
                let mut node = node.clone();
                node.set_topic_distance(d);
                result.add_node(node);
            }
        }
        let kept: Vec<Edge> = graph
            .edges()
            .filter(|edge| {
                match (result.get_node(&edge.source_uri), result.get_node(&edge.dest_uri)) {
                    (Some(source), Some(dest)) => self.keeps_edge(edge, source, dest),
                    _ => false,
                }
            })
            .cloned()
            .collect();
        for edge in kept {
            result.insert_keyed_edge(edge);
        }
        result
    }
}

/// Incident edges per node, both directions
struct EdgeIndex<'a> {
    incident: HashMap<&'a NodeUri, Vec<&'a Edge>>,
}

impl<'a> EdgeIndex<'a> {
    fn build(graph: &'a Graph) -> Self {
        let mut incident: HashMap<&NodeUri, Vec<&Edge>> = HashMap::new();
        for edge in graph.edges() {
            incident.entry(&edge.source_uri).or_default().push(edge);
            if edge.dest_uri != edge.source_uri {
                incident.entry(&edge.dest_uri).or_default().push(edge);
            }
        }
        Self { incident }
    }

    fn incident(&self, uri: &NodeUri) -> &[&'a Edge] {
        self.incident.get(uri).map(Vec::as_slice).unwrap_or(&[])
    }
}
