//! Topic graphs: the seed nodes a query starts from

use super::fragment::Graph;
use super::node::Node;

/// Build a topic graph from `(key, value)` pairs.
///
/// Each pair becomes one `attribute` node. Duplicate pairs collapse into a
/// single node. Edges are never created.
pub fn topic_graph<I, K, V>(pairs: I) -> Graph
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut graph = Graph::new();
    for (key, value) in pairs {
        graph.add_node(Node::attribute(key, value));
    }
    graph
}

/// Parse a `key=value` topic argument.
///
/// Only the first `=` splits, so values may contain further `=` signs.
pub fn parse_topic_pair(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key.to_lowercase(), value.to_string()))
}
