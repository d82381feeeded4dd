//! Reference enrichments
//!
//! Every fragment these produce contains the topic node, an `enrichment`
//! marker node named after the producing enrichment, and a `describedBy`
//! edge from the topic to the marker. Default queries do not follow
//! `enrichment` edges, so markers stay out of neighbourhoods.

mod lookup;
mod tld;

pub use lookup::{parse_feed, FeedRecord, FeedSource, LookupEnrichment};
pub use tld::{TldEnrichment, TLD};

use crate::graph::{key, Edge, Graph, GraphResult, Node};
use chrono::{DateTime, Utc};

/// Add the marker node for `enrichment` and link `topic` to it.
pub(crate) fn enrichment_marker(
    graph: &mut Graph,
    topic: &Node,
    enrichment: &str,
    start_time: Option<DateTime<Utc>>,
) -> GraphResult<()> {
    let marker = Node::attribute(key::ENRICHMENT, enrichment).with_start_time(start_time);
    graph.add_node(marker.clone());
    graph.add_edge(
        Edge::described_by(topic.uri.clone(), marker.uri, enrichment).with_start_time(start_time),
    )?;
    Ok(())
}
