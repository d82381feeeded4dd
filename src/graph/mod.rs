//! Attribute graph model: nodes, edges and the fragments built from them

mod edge;
mod error;
mod fragment;
mod node;
mod topic;
mod uri;

pub mod time;

#[cfg(test)]
mod tests;

pub use edge::{normalize_relationship, relationship, Edge, RelationshipChain, MAX_CHAIN_LEN};
pub use error::{GraphError, GraphResult};
pub use fragment::{Graph, GraphRecord, MergeStats};
pub use node::{class, key, Node, Properties, PropertyValue, TOPIC_DISTANCE};
pub use topic::{parse_topic_pair, topic_graph};
pub use uri::{canonical_edge_key, canonical_node_key, EdgeUri, NodeUri};
