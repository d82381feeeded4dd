//! Indicator lookup against a local threat-feed table
//!
//! The table is a comma-separated feed in the common c2 masterlist layout:
//!
//! ```text
//! # indicator,context,date,source
//! evil.test,Domain used by zeus C&C,2015-04-29 08:34,http://feed.test/zeus.txt
//! 192.0.2.10,Nameserver IP used by cryptolocker,2015-04-29,http://feed.test/cl.txt
//! ```
//!
//! A hit links the indicator to a `malware` node and, for C&C entries, to
//! the `classification=c2` node. Nameserver entries carry the
//! `describedBy -> nameserver` chain.

use super::enrichment_marker;
use crate::component::{
    CancellationToken, ComponentError, ComponentResult, Enrichment, EnrichmentConfiguration,
    EnrichmentRequest,
};
use crate::graph::time::parse_timestamp;
use crate::graph::{key, relationship, Edge, Graph, Node, RelationshipChain};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

const USED_BY: &str = " used by ";
const C2_SUFFIX: &str = " C&C";

/// One parsed feed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    pub indicator: String,
    /// Attribute key of the indicator (`ip` or `domain`)
    pub key: String,
    /// Whether the indicator is a nameserver for the threat
    pub nameserver: bool,
    pub threat: String,
    /// Whether the indicator is command-and-control infrastructure
    pub c2: bool,
    pub observed: Option<DateTime<Utc>>,
    pub source: String,
}

/// Parse a feed. Returns the records and the number of unusable lines.
pub fn parse_feed(text: &str) -> (Vec<FeedRecord>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }
    (records, skipped)
}

fn parse_line(line: &str) -> Option<FeedRecord> {
    let mut fields = line.splitn(4, ',');
    let indicator = fields.next()?.trim();
    let context = fields.next()?.trim();
    let date = fields.next()?.trim();
    let source = fields.next()?.trim();
    if indicator.is_empty() {
        return None;
    }

    let (kind, threat) = context.split_once(USED_BY)?;
    let (key, nameserver) = match kind.trim() {
        "IP" => (key::IP, false),
        "Domain" => (key::DOMAIN, false),
        "Nameserver IP" => (key::IP, true),
        "Nameserver" => (key::DOMAIN, true),
        _ => return None,
    };
    let threat = threat.trim();
    let (threat, c2) = match threat.strip_suffix(C2_SUFFIX) {
        Some(name) => (name.trim(), true),
        None => (threat, false),
    };
    if threat.is_empty() {
        return None;
    }

    Some(FeedRecord {
        indicator: normalize_value(key, indicator),
        key: key.to_string(),
        nameserver,
        threat: threat.to_string(),
        c2,
        observed: parse_feed_date(date),
        source: source.to_string(),
    })
}

/// Feed dates come in several shapes; unparseable dates become `None`.
fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(Some(ts)) = parse_timestamp(raw) {
        return Some(ts);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn normalize_value(key: &str, value: &str) -> String {
    let value = value.trim();
    if key == key::DOMAIN {
        value.trim_end_matches('.').to_lowercase()
    } else {
        value.to_string()
    }
}

/// Where the feed table comes from
#[derive(Debug, Clone)]
pub enum FeedSource {
    File(PathBuf),
    Inline(String),
}

type IndicatorTable = HashMap<(String, String), Vec<FeedRecord>>;

/// Enrichment answering from a local feed table
pub struct LookupEnrichment {
    name: String,
    source: FeedSource,
    cost: u32,
    speed: u32,
    table: RwLock<IndicatorTable>,
}

impl LookupEnrichment {
    pub fn new(name: impl Into<String>, source: FeedSource) -> Self {
        Self {
            name: name.into(),
            source,
            cost: 1,
            speed: 2,
            table: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_ratings(mut self, cost: u32, speed: u32) -> Self {
        self.cost = cost;
        self.speed = speed;
        self
    }

    fn load(&self) -> Result<usize, String> {
        let text = match &self.source {
            FeedSource::File(path) => std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?,
            FeedSource::Inline(text) => text.clone(),
        };
        let (records, skipped) = parse_feed(&text);
        if skipped > 0 {
            warn!(enrichment = %self.name, skipped, "skipped unparseable feed lines");
        }

        let mut table = IndicatorTable::new();
        for record in records {
            table
                .entry((record.key.clone(), record.indicator.clone()))
                .or_default()
                .push(record);
        }
        let count = table.len();
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
        Ok(count)
    }

    fn build_fragment(
        &self,
        request: &EnrichmentRequest,
        records: &[FeedRecord],
    ) -> ComponentResult<Graph> {
        let value = normalize_value(&request.topic_type, &request.topic);
        let topic =
            Node::attribute(&request.topic_type, &value).with_start_time(request.start_time);

        let mut g = Graph::new();
        g.add_node(topic.clone());
        enrichment_marker(&mut g, &topic, &self.name, request.start_time)?;

        for record in records {
            let chain = if record.nameserver {
                RelationshipChain::new(vec![
                    relationship::DESCRIBED_BY.to_string(),
                    "nameserver".to_string(),
                ])?
            } else {
                RelationshipChain::single(relationship::DESCRIBED_BY)
            };

            let malware =
                Node::attribute(key::MALWARE, &record.threat).with_start_time(record.observed);
            g.add_node(malware.clone());
            g.add_edge(
                Edge::new(topic.uri.clone(), malware.uri, chain.clone(), &record.source)
                    .with_start_time(record.observed),
            )?;

            if record.c2 {
                let c2 =
                    Node::attribute(key::CLASSIFICATION, "c2").with_start_time(record.observed);
                g.add_node(c2.clone());
                g.add_edge(
                    Edge::new(topic.uri.clone(), c2.uri, chain, &record.source)
                        .with_start_time(record.observed),
                )?;
            }
        }
        Ok(g)
    }
}

#[async_trait]
impl Enrichment for LookupEnrichment {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self) -> ComponentResult<EnrichmentConfiguration> {
        let (configured, description) = match self.load() {
            Ok(count) => (true, format!("Local feed lookup ({} indicators)", count)),
            Err(reason) => {
                warn!(enrichment = %self.name, %reason, "feed table unavailable");
                (false, format!("Local feed lookup (unavailable: {})", reason))
            }
        };
        Ok(EnrichmentConfiguration {
            configured,
            description,
            input_types: vec![key::IP.to_string(), key::DOMAIN.to_string()],
            cost: self.cost,
            speed: self.speed,
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
        if request.topic.trim().is_empty() {
            return Err(ComponentError::InvalidInput("empty topic".to_string()));
        }

        let lookup = (
            request.topic_type.clone(),
            normalize_value(&request.topic_type, &request.topic),
        );
        let records = self
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&lookup)
            .cloned()
            .unwrap_or_default();
        debug!(enrichment = %self.name, topic = %request.topic, hits = records.len(), "feed lookup");

        self.build_fragment(request, &records)
    }
}
