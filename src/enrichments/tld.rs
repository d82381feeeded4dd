//! Top-level domain enrichment

use super::enrichment_marker;
use crate::component::{
    CancellationToken, ComponentError, ComponentResult, Enrichment, EnrichmentConfiguration,
    EnrichmentRequest,
};
use crate::graph::{key, Edge, Graph, Node};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Node key for top-level domains
pub const TLD: &str = "tld";

const DEFAULT_MULTI_LABEL_SUFFIXES: [&str; 8] = [
    "co.uk", "org.uk", "ac.uk", "gov.uk", "com.au", "net.au", "co.jp", "com.br",
];

/// Links a domain to its top-level domain (or registry suffix).
///
/// Purely local: needs no configuration and never fails for a well-formed
/// domain.
pub struct TldEnrichment {
    name: String,
    suffixes: BTreeSet<String>,
}

impl Default for TldEnrichment {
    fn default() -> Self {
        Self::new("tld")
    }
}

impl TldEnrichment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffixes: DEFAULT_MULTI_LABEL_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Add registry suffixes spanning more than one label, e.g. `co.uk`.
    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.suffixes.extend(
            suffixes
                .into_iter()
                .map(|s| s.as_ref().trim().trim_matches('.').to_lowercase())
                .filter(|s| !s.is_empty()),
        );
        self
    }

    /// Suffix of `domain`, longest known multi-label suffix first
    pub fn suffix_of(&self, domain: &str) -> Option<String> {
        let domain = domain.trim().trim_end_matches('.').to_lowercase();
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return None;
        }
        for take in (2..labels.len()).rev() {
            let candidate = labels[labels.len() - take..].join(".");
            if self.suffixes.contains(&candidate) {
                return Some(candidate);
            }
        }
        labels.last().map(|l| l.to_string())
    }
}

#[async_trait]
impl Enrichment for TldEnrichment {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self) -> ComponentResult<EnrichmentConfiguration> {
        Ok(EnrichmentConfiguration {
            configured: true,
            description: "Top-level domain of a domain".to_string(),
            input_types: vec![key::DOMAIN.to_string()],
            cost: 1,
            speed: 1,
        })
    }

    async fn run(
        &self,
        request: &EnrichmentRequest,
        cancel: &CancellationToken,
    ) -> ComponentResult<Graph> {
        if cancel.is_cancelled() {
            return Err(ComponentError::Cancelled);
        }
        if request.topic_type != key::DOMAIN {
            return Err(ComponentError::InvalidInput(format!(
                "unsupported topic type '{}'",
                request.topic_type
            )));
        }
        let suffix = self.suffix_of(&request.topic).ok_or_else(|| {
            ComponentError::InvalidInput(format!("not a domain: '{}'", request.topic))
        })?;

        let domain = request.topic.trim().trim_end_matches('.').to_lowercase();
        let topic = Node::attribute(key::DOMAIN, domain).with_start_time(request.start_time);
        let tld = Node::attribute(TLD, suffix).with_start_time(request.start_time);

        let mut g = Graph::new();
        g.add_node(topic.clone());
        g.add_node(tld.clone());
        g.add_edge(
            Edge::described_by(topic.uri.clone(), tld.uri, &self.name)
                .with_start_time(request.start_time),
        )?;
        enrichment_marker(&mut g, &topic, &self.name, request.start_time)?;
        Ok(g)
    }
}
