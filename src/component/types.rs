//! Configuration records and call requests exchanged with components

use crate::catalog::{CatalogEntry, ComponentCategory};
use crate::graph::Graph;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// What an enrichment reports about itself from `configure`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentConfiguration {
    /// `false` when the component loaded but cannot work (missing table, key...)
    pub configured: bool,
    pub description: String,
    pub input_types: Vec<String>,
    pub cost: u32,
    pub speed: u32,
}

impl EnrichmentConfiguration {
    pub(crate) fn into_entry(self, name: &str) -> CatalogEntry {
        CatalogEntry::new(name, ComponentCategory::Enrichment, self.cost, self.speed)
            .with_configured(self.configured)
            .with_description(self.description)
            .with_input_types(self.input_types)
    }
}

/// What a storage interface or scorer reports from `configure`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfiguration {
    pub configured: bool,
    pub description: String,
    pub cost: u32,
    pub speed: u32,
}

impl InterfaceConfiguration {
    pub(crate) fn into_entry(self, name: &str, category: ComponentCategory) -> CatalogEntry {
        CatalogEntry::new(name, category, self.cost, self.speed)
            .with_configured(self.configured)
            .with_description(self.description)
    }
}

/// One enrichment call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub topic: String,
    pub topic_type: String,
    /// Observation time to stamp on created nodes; `None` when unknown
    pub start_time: Option<DateTime<Utc>>,
}

impl EnrichmentRequest {
    pub fn new(topic: impl Into<String>, topic_type: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            topic_type: topic_type.into().trim().to_lowercase(),
            start_time: None,
        }
    }

    pub fn with_start_time(mut self, start_time: Option<DateTime<Utc>>) -> Self {
        self.start_time = start_time;
        self
    }
}

/// Default traversal depth for queries
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Default relationship categories a query does not traverse
pub const DEFAULT_DONT_FOLLOW: [&str; 2] = ["enrichment", "classification"];

/// One bounded-traversal query against a storage interface
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Topic nodes the traversal starts from
    pub topic: Graph,
    pub max_depth: usize,
    /// Edge categories that are never traversed
    pub dont_follow: BTreeSet<String>,
}

impl QueryRequest {
    pub fn new(topic: Graph) -> Self {
        Self {
            topic,
            max_depth: DEFAULT_MAX_DEPTH,
            dont_follow: DEFAULT_DONT_FOLLOW.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_dont_follow<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dont_follow = categories.into_iter().map(Into::into).collect();
        self
    }
}
