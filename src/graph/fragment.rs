//! Graph: the directed multi-graph used for fragments and working graphs
//!
//! One type serves both roles. A fragment is what a single component call
//! returns; the working graph is what the orchestrator folds fragments into.
//! Folding uses merge-by-URI for nodes and union for edges, both of which
//! are commutative, so the result does not depend on completion order.

use super::edge::Edge;
use super::error::GraphResult;
use super::node::Node;
use super::uri::{canonical_node_key, EdgeUri, NodeUri};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire shape of a graph: ordered node and edge records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphRecord {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Directed multi-graph keyed by node and edge URI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphRecord", into = "GraphRecord")]
pub struct Graph {
    nodes: Vec<Node>,
    node_index: HashMap<NodeUri, usize>,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeUri, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, merging with any node that already has the same URI.
    ///
    /// The URI is re-derived from `(class, key, value)` first, so a stale
    /// `uri` cannot merge two different triples. Returns `true` if the node
    /// was new.
    pub fn add_node(&mut self, mut node: Node) -> bool {
        node.uri = canonical_node_key(&node.class, &node.key, &node.value);
        match self.node_index.get(&node.uri) {
            Some(&idx) => {
                self.nodes[idx].absorb(&node);
                false
            }
            None => {
                self.node_index.insert(node.uri.clone(), self.nodes.len());
                self.nodes.push(node);
                true
            }
        }
    }

    /// Add an edge. Returns `true` if the edge was new.
    ///
    /// The edge is re-keyed with its canonical URI. An edge whose URI is
    /// already present is the same edge: only its time span widens. Edges
    /// that differ in chain or origin get distinct URIs and are all kept.
    pub fn add_edge(&mut self, mut edge: Edge) -> GraphResult<bool> {
        edge.normalize()?;
        Ok(self.insert_keyed_edge(edge))
    }

    /// Insert an edge taken from another `Graph`, whose URI is already
    /// canonical
    pub(crate) fn insert_keyed_edge(&mut self, edge: Edge) -> bool {
        match self.edge_index.get(&edge.uri) {
            Some(&idx) => {
                self.edges[idx].absorb(&edge);
                false
            }
            None => {
                self.edge_index.insert(edge.uri.clone(), self.edges.len());
                self.edges.push(edge);
                true
            }
        }
    }

    /// Fold a whole fragment into this graph.
    ///
    /// Every edge of a `Graph` is already canonical, so this cannot fail.
    pub fn merge(&mut self, other: Graph) -> MergeStats {
        let mut stats = MergeStats::default();
        for node in other.nodes {
            if self.add_node(node) {
                stats.nodes_added += 1;
            } else {
                stats.nodes_merged += 1;
            }
        }
        for edge in other.edges {
            if self.insert_keyed_edge(edge) {
                stats.edges_added += 1;
            } else {
                stats.edges_merged += 1;
            }
        }
        stats
    }

    pub fn get_node(&self, uri: &NodeUri) -> Option<&Node> {
        self.node_index.get(uri).map(|&idx| &self.nodes[idx])
    }

    /// Stamp `topic_distance` on a node; `false` if the node is absent.
    pub fn set_topic_distance(&mut self, uri: &NodeUri, distance: usize) -> bool {
        match self.node_index.get(uri) {
            Some(&idx) => {
                self.nodes[idx].set_topic_distance(distance);
                true
            }
            None => false,
        }
    }

    pub fn contains_node(&self, uri: &NodeUri) -> bool {
        self.node_index.contains_key(uri)
    }

    pub fn get_edge(&self, uri: &EdgeUri) -> Option<&Edge> {
        self.edge_index.get(uri).map(|&idx| &self.edges[idx])
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Edges with at least one endpoint missing from the graph
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.source_uri) || !self.contains_node(&e.dest_uri))
    }

    /// Drop property `name` from every node
    pub fn remove_node_property(&mut self, name: &str) {
        for node in &mut self.nodes {
            node.properties.remove(name);
        }
    }

    /// Keep only nodes matching `keep`; edges touching a dropped node go too.
    pub fn retain_nodes(&mut self, mut keep: impl FnMut(&Node) -> bool) {
        self.nodes.retain(|n| keep(n));
        let kept: std::collections::HashSet<NodeUri> =
            self.nodes.iter().map(|n| n.uri.clone()).collect();
        self.edges
            .retain(|e| kept.contains(&e.source_uri) && kept.contains(&e.dest_uri));
        self.reindex();
    }

    /// Keep only edges matching `keep`.
    pub fn retain_edges(&mut self, keep: impl FnMut(&Edge) -> bool) {
        self.edges.retain(keep);
        self.reindex();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    fn reindex(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.uri.clone(), i))
            .collect();
        self.edge_index = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| (e.uri.clone(), i))
            .collect();
    }
}

/// Counts from a [`Graph::merge`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub nodes_added: usize,
    pub nodes_merged: usize,
    pub edges_added: usize,
    pub edges_merged: usize,
}

impl TryFrom<GraphRecord> for Graph {
    type Error = super::error::GraphError;

    fn try_from(record: GraphRecord) -> Result<Self, Self::Error> {
        let mut graph = Graph::new();
        for node in record.nodes {
            graph.add_node(node);
        }
        for edge in record.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }
}

impl From<Graph> for GraphRecord {
    fn from(graph: Graph) -> Self {
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{key, RelationshipChain};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(year: i32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn same_triple_collapses_to_one_node() {
        let mut g = Graph::new();
        assert!(g.add_node(Node::attribute(key::IP, "1.2.3.4").with_start_time(ts(2014))));
        assert!(!g.add_node(Node::attribute(key::IP, "1.2.3.4").with_start_time(ts(2013))));

        assert_eq!(g.node_count(), 1);
        let node = g.nodes().next().unwrap();
        assert_eq!(node.start_time, ts(2013));
    }

    #[test]
    fn fragment_with_earlier_start_wins() {
        let x = Node::attribute(key::IP, "1.2.3.4");

        let mut f1 = Graph::new();
        f1.add_node(x.clone().with_start_time(ts(2015)));
        let mut f2 = Graph::new();
        f2.add_node(x.clone().with_start_time(ts(2012)));

        let mut working = Graph::new();
        working.merge(f1);
        working.merge(f2);

        assert_eq!(working.node_count(), 1);
        assert_eq!(working.get_node(&x.uri).unwrap().start_time, ts(2012));
    }

    #[test]
    fn finish_time_takes_latest_when_present() {
        let x = Node::attribute(key::DOMAIN, "a.test");
        let mut g = Graph::new();
        g.add_node(x.clone().with_finish_time(ts(2015)));
        g.add_node(x.clone());
        g.add_node(x.clone().with_finish_time(ts(2017)));
        g.add_node(x.clone().with_finish_time(ts(2016)));
        assert_eq!(g.get_node(&x.uri).unwrap().finish_time, ts(2017));
    }

    #[test]
    fn parallel_edges_kept_when_origin_or_chain_differs() {
        let a = Node::attribute(key::DOMAIN, "a.test");
        let m = Node::attribute(key::MALWARE, "zeus");
        let mut g = Graph::new();
        g.add_node(a.clone());
        g.add_node(m.clone());

        let base = Edge::described_by(a.uri.clone(), m.uri.clone(), "feed-a");
        let other_origin = Edge::described_by(a.uri.clone(), m.uri.clone(), "feed-b");
        let chained = Edge::new(
            a.uri.clone(),
            m.uri.clone(),
            RelationshipChain::new(vec!["describedBy".into(), "nameserver".into()]).unwrap(),
            "feed-a",
        );

        assert!(g.add_edge(base.clone()).unwrap());
        assert!(g.add_edge(other_origin).unwrap());
        assert!(g.add_edge(chained).unwrap());
        assert!(!g.add_edge(base).unwrap());
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn repeated_merge_is_idempotent() {
        let a = Node::attribute(key::IP, "10.1.1.1").with_start_time(ts(2014));
        let c = Node::attribute(key::CLASSIFICATION, "c2").with_start_time(ts(2014));
        let mut fragment = Graph::new();
        fragment.add_node(a.clone());
        fragment.add_node(c.clone());
        fragment
            .add_edge(Edge::described_by(a.uri.clone(), c.uri.clone(), "feed").with_start_time(ts(2014)))
            .unwrap();

        let mut working = Graph::new();
        working.merge(fragment.clone());
        let snapshot = working.clone();
        let stats = working.merge(fragment);

        assert_eq!(working, snapshot);
        assert_eq!(stats.nodes_added, 0);
        assert_eq!(stats.edges_added, 0);
    }

    #[test]
    fn stale_edge_uri_is_rekeyed() {
        let a = Node::attribute(key::IP, "10.1.1.1");
        let b = Node::attribute(key::DOMAIN, "b.test");
        let mut edge = Edge::described_by(a.uri.clone(), b.uri.clone(), "feed");
        let expected = edge.uri.clone();
        edge.uri = EdgeUri::from_string("hand-made");

        let mut g = Graph::new();
        g.add_edge(edge).unwrap();
        assert!(g.get_edge(&expected).is_some());
    }

    #[test]
    fn retain_nodes_drops_touching_edges() {
        let a = Node::attribute(key::IP, "10.1.1.1");
        let b = Node::attribute(key::DOMAIN, "b.test");
        let mut g = Graph::new();
        g.add_node(a.clone());
        g.add_node(b.clone());
        g.add_edge(Edge::described_by(a.uri.clone(), b.uri.clone(), "feed")).unwrap();

        g.retain_nodes(|n| n.key == key::IP);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
        assert!(g.contains_node(&a.uri));
        assert!(!g.contains_node(&b.uri));
    }

    #[test]
    fn dangling_edges_reported() {
        let a = Node::attribute(key::IP, "10.1.1.1");
        let b = Node::attribute(key::DOMAIN, "b.test");
        let mut g = Graph::new();
        g.add_node(a.clone());
        g.add_edge(Edge::described_by(a.uri.clone(), b.uri.clone(), "feed")).unwrap();
        assert_eq!(g.dangling_edges().count(), 1);
    }
}
