//! Directed, provenance-carrying edges

use super::error::{GraphError, GraphResult};
use super::time;
use super::uri::{canonical_edge_key, EdgeUri, NodeUri};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Well-known relationships
pub mod relationship {
    pub const DESCRIBED_BY: &str = "describedBy";
    pub const TALKS_TO: &str = "talksTo";
    pub const INFLUENCES: &str = "influences";
}

/// Upper bound on relationship chain length, head included
pub const MAX_CHAIN_LEN: usize = 8;

/// Map legacy snake_case relationship names onto their canonical spelling.
pub fn normalize_relationship(raw: &str) -> String {
    match raw.trim() {
        "described_by" => relationship::DESCRIBED_BY.to_string(),
        "talks_to" => relationship::TALKS_TO.to_string(),
        other => other.to_string(),
    }
}

/// A relationship plus its chained sub-relationships, head first.
///
/// `["describedBy", "nameserver"]` reads "described by, in the capacity of
/// nameserver". Links never repeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipChain(Vec<String>);

impl RelationshipChain {
    /// A chain of one link
    pub fn single(relationship: impl Into<String>) -> Self {
        Self(vec![normalize_relationship(&relationship.into())])
    }

    /// Build from explicit links, validating length and cycles.
    pub fn new(links: Vec<String>) -> GraphResult<Self> {
        if links.is_empty() || links[0].trim().is_empty() {
            return Err(GraphError::EmptyRelationship);
        }
        let mut chain = Vec::with_capacity(links.len());
        let mut seen = HashSet::new();
        for (i, link) in links.into_iter().enumerate() {
            let link = if i == 0 { normalize_relationship(&link) } else { link };
            if !seen.insert(link.clone()) {
                return Err(GraphError::ChainCycle { link, chain });
            }
            chain.push(link);
            if chain.len() > MAX_CHAIN_LEN {
                return Err(GraphError::ChainTooLong {
                    max: MAX_CHAIN_LEN,
                    chain,
                });
            }
        }
        Ok(Self(chain))
    }

    /// Resolve a chain from attribute-map form.
    ///
    /// Starts at `attrs["relationship"]` and follows while the current value
    /// is itself a key of `attrs`. A missing `relationship` key defaults to
    /// `describedBy`.
    pub fn resolve(attrs: &BTreeMap<String, String>) -> GraphResult<Self> {
        let head = attrs
            .get("relationship")
            .map(|r| normalize_relationship(r))
            .unwrap_or_else(|| relationship::DESCRIBED_BY.to_string());

        let mut links = vec![head];
        let mut seen: HashSet<String> = links.iter().cloned().collect();
        loop {
            let current = &links[links.len() - 1];
            let Some(next) = attrs.get(current.as_str()) else {
                break;
            };
            if !seen.insert(next.clone()) {
                return Err(GraphError::ChainCycle {
                    link: next.clone(),
                    chain: links,
                });
            }
            links.push(next.clone());
            if links.len() > MAX_CHAIN_LEN {
                return Err(GraphError::ChainTooLong {
                    max: MAX_CHAIN_LEN,
                    chain: links,
                });
            }
        }
        Ok(Self(links))
    }

    pub fn head(&self) -> &str {
        &self.0[0]
    }

    pub fn tail(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn links(&self) -> &[String] {
        &self.0
    }
}

/// A directed edge between two nodes
///
/// Parallel edges are normal: the same two nodes can be linked by several
/// edges that differ in relationship chain or origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_uri: NodeUri,
    pub dest_uri: NodeUri,
    /// Head of the relationship chain
    pub relationship: String,
    /// Chained sub-relationships after the head
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationship_chain: Vec<String>,
    /// Provenance: which source asserted this edge
    #[serde(default)]
    pub origin: String,
    #[serde(default, with = "time::optional")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "time::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub finish_time: Option<DateTime<Utc>>,
    pub uri: EdgeUri,
}

impl Edge {
    /// Create an edge; the URI is derived from endpoints, chain and origin.
    pub fn new(
        source: NodeUri,
        dest: NodeUri,
        chain: RelationshipChain,
        origin: impl Into<String>,
    ) -> Self {
        let origin = origin.into();
        let uri = canonical_edge_key(&source, &dest, chain.links(), &origin);
        Self {
            source_uri: source,
            dest_uri: dest,
            relationship: chain.head().to_string(),
            relationship_chain: chain.tail().to_vec(),
            origin,
            start_time: None,
            finish_time: None,
            uri,
        }
    }

    /// `source` describedBy `dest`, the most common enrichment edge
    pub fn described_by(source: NodeUri, dest: NodeUri, origin: impl Into<String>) -> Self {
        Self::new(
            source,
            dest,
            RelationshipChain::single(relationship::DESCRIBED_BY),
            origin,
        )
    }

    pub fn with_start_time(mut self, start: Option<DateTime<Utc>>) -> Self {
        self.start_time = start;
        self
    }

    pub fn with_finish_time(mut self, finish: Option<DateTime<Utc>>) -> Self {
        self.finish_time = finish;
        self
    }

    /// The full, validated relationship chain
    pub fn chain(&self) -> GraphResult<RelationshipChain> {
        let mut links = Vec::with_capacity(1 + self.relationship_chain.len());
        links.push(self.relationship.clone());
        links.extend(self.relationship_chain.iter().cloned());
        RelationshipChain::new(links)
    }

    /// The URI this edge must have, recomputed from its identity fields.
    ///
    /// Edges arriving from components are re-keyed with this so a stale or
    /// hand-built `uri` cannot break edge identity.
    pub fn canonical_uri(&self) -> GraphResult<EdgeUri> {
        let chain = self.chain()?;
        Ok(canonical_edge_key(
            &self.source_uri,
            &self.dest_uri,
            chain.links(),
            &self.origin,
        ))
    }

    /// Normalize the relationship head and re-key the URI to match.
    pub fn normalize(&mut self) -> GraphResult<()> {
        let chain = self.chain()?;
        self.relationship = chain.head().to_string();
        self.uri = canonical_edge_key(
            &self.source_uri,
            &self.dest_uri,
            chain.links(),
            &self.origin,
        );
        Ok(())
    }

    /// Relationship categories this edge belongs to (every chain link)
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.relationship.as_str())
            .chain(self.relationship_chain.iter().map(String::as_str))
    }

    /// The endpoint opposite `node`, if `node` is one of the endpoints
    pub fn other_end(&self, node: &NodeUri) -> Option<&NodeUri> {
        if &self.source_uri == node {
            Some(&self.dest_uri)
        } else if &self.dest_uri == node {
            Some(&self.source_uri)
        } else {
            None
        }
    }

    /// Fold another observation of the same edge into this one.
    pub fn absorb(&mut self, other: &Edge) {
        debug_assert_eq!(self.uri, other.uri);
        self.start_time = time::earliest(self.start_time, other.start_time);
        self.finish_time = time::latest(self.finish_time, other.finish_time);
    }
}
