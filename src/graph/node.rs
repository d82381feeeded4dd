//! Attribute nodes in the knowledge graph

use super::time;
use super::uri::{canonical_node_key, NodeUri};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Well-known node classes
pub mod class {
    pub const ATTRIBUTE: &str = "attribute";
}

/// Well-known node keys (attribute types)
pub mod key {
    pub const IP: &str = "ip";
    pub const DOMAIN: &str = "domain";
    pub const MALWARE: &str = "malware";
    pub const CLASSIFICATION: &str = "classification";
    pub const ENRICHMENT: &str = "enrichment";
}

/// Property written by storage interfaces on every query result node
pub const TOPIC_DISTANCE: &str = "topic_distance";

/// Typed property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<PropertyValue>),
    Object(HashMap<String, PropertyValue>),
}

/// Extra node attributes, ordered for stable output
pub type Properties = BTreeMap<String, PropertyValue>;

/// A node in the knowledge graph
///
/// Identity is the `uri`, derived from `(class, key, value)`. Two nodes
/// with the same triple are the same fact observed twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uri: NodeUri,
    pub class: String,
    pub key: String,
    pub value: String,
    /// Earliest observation
    #[serde(default, with = "time::optional")]
    pub start_time: Option<DateTime<Utc>>,
    /// Latest observation
    #[serde(
        default,
        with = "time::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub finish_time: Option<DateTime<Utc>>,
    /// Any further attributes, flattened into the wire record
    #[serde(flatten)]
    pub properties: Properties,
}

impl Node {
    /// Create a node, deriving its URI from the triple
    pub fn new(class: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        let class = class.into();
        let key = key.into();
        let value = value.into();
        Self {
            uri: canonical_node_key(&class, &key, &value),
            class,
            key,
            value,
            start_time: None,
            finish_time: None,
            properties: Properties::new(),
        }
    }

    /// Create an `attribute`-class node
    pub fn attribute(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(class::ATTRIBUTE, key, value)
    }

    pub fn with_start_time(mut self, start: Option<DateTime<Utc>>) -> Self {
        self.start_time = start;
        self
    }

    pub fn with_finish_time(mut self, finish: Option<DateTime<Utc>>) -> Self {
        self.finish_time = finish;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Fold another observation of the same node into this one.
    ///
    /// Keeps the earliest start and the latest finish. Properties present
    /// only on `other` are added; properties already present are kept.
    pub fn absorb(&mut self, other: &Node) {
        debug_assert_eq!(self.uri, other.uri);
        self.start_time = time::earliest(self.start_time, other.start_time);
        self.finish_time = time::latest(self.finish_time, other.finish_time);
        for (k, v) in &other.properties {
            self.properties.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    /// Hop count from the nearest topic node, if this node came from a query
    pub fn topic_distance(&self) -> Option<usize> {
        match self.properties.get(TOPIC_DISTANCE) {
            Some(PropertyValue::Int(d)) if *d >= 0 => Some(*d as usize),
            _ => None,
        }
    }

    pub fn set_topic_distance(&mut self, distance: usize) {
        self.properties
            .insert(TOPIC_DISTANCE.to_string(), PropertyValue::Int(distance as i64));
    }
}
