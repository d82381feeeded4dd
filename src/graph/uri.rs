//! Canonical identity keys for nodes and edges
//!
//! Every merge and lookup in the crate keys off [`canonical_node_key`] and
//! [`canonical_edge_key`]. Field order is fixed and reserved characters are
//! escaped, so two different facts can never render to the same key.

use super::error::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a node, derived from `(class, key, value)`.
///
/// Serializes as a plain string, e.g. `class=attribute&key=ip&value=1.1.1.1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeUri(String);

impl NodeUri {
    /// Wrap an already-rendered URI without validating it.
    ///
    /// Storage backends use this when reading rows they wrote themselves.
    pub fn from_string(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Parse and validate a node URI, returning it in canonical form.
    pub fn parse(uri: &str) -> GraphResult<Self> {
        let (class, key, value) = Self::split(uri)?;
        Ok(canonical_node_key(&class, &key, &value))
    }

    /// Recover the `(class, key, value)` triple this URI was built from.
    pub fn triple(&self) -> GraphResult<(String, String, String)> {
        Self::split(&self.0)
    }

    fn split(uri: &str) -> GraphResult<(String, String, String)> {
        let mut class = None;
        let mut key = None;
        let mut value = None;

        for pair in uri.split('&') {
            let (name, raw) = pair
                .split_once('=')
                .ok_or_else(|| GraphError::InvalidUri(uri.to_string()))?;
            let slot = match name {
                "class" => &mut class,
                "key" => &mut key,
                "value" => &mut value,
                _ => return Err(GraphError::InvalidUri(uri.to_string())),
            };
            if slot.is_some() {
                return Err(GraphError::InvalidUri(uri.to_string()));
            }
            *slot = Some(unescape(raw).ok_or_else(|| GraphError::InvalidUri(uri.to_string()))?);
        }

        match (class, key, value) {
            (Some(c), Some(k), Some(v)) => Ok((c, k, v)),
            _ => Err(GraphError::InvalidUri(uri.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name-based UUID of this URI, used when hashing edge endpoints.
    pub fn hash_uuid(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, self.0.as_bytes())
    }
}

impl std::fmt::Display for NodeUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeUri {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable identifier of an edge.
///
/// Encodes the hashed endpoints, the full relationship chain and the origin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeUri(String);

impl EdgeUri {
    pub fn from_string(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EdgeUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build the canonical URI for a node.
pub fn canonical_node_key(class: &str, key: &str, value: &str) -> NodeUri {
    NodeUri(format!(
        "class={}&key={}&value={}",
        escape(class),
        escape(key),
        escape(value)
    ))
}

/// Build the canonical URI for an edge.
///
/// `chain` is the full relationship chain, head first. Each link after the
/// first is rendered as `<previous>=<link>`, so `["describedBy", "nameserver"]`
/// becomes `relationship=describedBy&describedBy=nameserver`.
pub fn canonical_edge_key(
    source: &NodeUri,
    destination: &NodeUri,
    chain: &[String],
    origin: &str,
) -> EdgeUri {
    let mut uri = format!(
        "source={}&destination={}",
        source.hash_uuid(),
        destination.hash_uuid()
    );

    let mut previous = "relationship";
    for link in chain {
        uri.push('&');
        uri.push_str(&escape(previous));
        uri.push('=');
        uri.push_str(&escape(link));
        previous = link;
    }

    uri.push_str("&origin=");
    uri.push_str(&escape(origin));
    EdgeUri(uri)
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let code = rest.get(idx + 1..idx + 3)?;
        match code {
            "25" => out.push('%'),
            "26" => out.push('&'),
            "3D" | "3d" => out.push('='),
            _ => return None,
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Some(out)
}
