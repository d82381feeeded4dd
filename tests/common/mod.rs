//! Mock components shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use threatgraph::component::{
    ComponentResult, EnrichmentConfiguration, InterfaceConfiguration,
};
use threatgraph::graph::{key, Edge, Graph, Node};
use threatgraph::{
    CancellationToken, ComponentError, Enrichment, EnrichmentRequest, QueryRequest, Scorer, Scores,
    StorageInterface,
};

pub fn ts(year: i32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()
}

/// `topic -> malware` fragment asserted by `origin`
pub fn malware_fragment(
    topic_type: &str,
    topic: &str,
    malware: &str,
    origin: &str,
    start: Option<DateTime<Utc>>,
) -> Graph {
    let t = Node::attribute(topic_type, topic).with_start_time(start);
    let m = Node::attribute(key::MALWARE, malware).with_start_time(start);
    let mut g = Graph::new();
    g.add_node(t.clone());
    g.add_node(m.clone());
    g.add_edge(Edge::described_by(t.uri, m.uri, origin).with_start_time(start))
        .unwrap();
    g
}

/// What a mock enrichment does when run
#[derive(Clone)]
pub enum Behavior {
    Return(Graph),
    Fail,
    Panic,
    Sleep(Duration, Graph),
    /// Block until cancelled
    AwaitCancel,
}

/// Scriptable enrichment
pub struct MockEnrichment {
    name: String,
    inputs: Vec<String>,
    cost: u32,
    speed: u32,
    configure_ok: bool,
    ready: bool,
    behavior: Behavior,
    pub calls: Arc<AtomicUsize>,
}

impl MockEnrichment {
    pub fn new(name: &str, inputs: &[&str], behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            cost: 2,
            speed: 2,
            configure_ok: true,
            ready: true,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn returning(name: &str, inputs: &[&str], fragment: Graph) -> Self {
        Self::new(name, inputs, Behavior::Return(fragment))
    }

    pub fn ratings(mut self, cost: u32, speed: u32) -> Self {
        self.cost = cost;
        self.speed = speed;
        self
    }

    /// `configure` returns an error
    pub fn broken(mut self) -> Self {
        self.configure_ok = false;
        self
    }

    /// `configure` succeeds but reports `configured: false` with unset
    /// ratings
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self.cost = 9999;
        self.speed = 9999;
        self
    }
}

#[async_trait]
impl Enrichment for MockEnrichment {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self) -> ComponentResult<EnrichmentConfiguration> {
        if !self.configure_ok {
            return Err(ComponentError::Configuration("missing api key".to_string()));
        }
        Ok(EnrichmentConfiguration {
            configured: self.ready,
            description: format!("mock {}", self.name),
            input_types: self.inputs.clone(),
            cost: self.cost,
            speed: self.speed,
        })
    }

    async fn run(
        &self,
        _request: &EnrichmentRequest,
        cancel: &CancellationToken,
    ) -> ComponentResult<Graph> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Return(g) => Ok(g.clone()),
            Behavior::Fail => Err(ComponentError::Invocation("upstream returned 500".to_string())),
            Behavior::Panic => panic!("mock enrichment panicked"),
            Behavior::Sleep(delay, g) => {
                tokio::time::sleep(*delay).await;
                Ok(g.clone())
            }
            Behavior::AwaitCancel => {
                cancel.cancelled().await;
                Err(ComponentError::Cancelled)
            }
        }
    }
}

/// Scores every node `1.0` and also scores a URI outside the subgraph
pub struct FlatScorer;

#[async_trait]
impl Scorer for FlatScorer {
    fn name(&self) -> &str {
        "flat"
    }

    async fn configure(&self) -> ComponentResult<InterfaceConfiguration> {
        Ok(InterfaceConfiguration {
            configured: true,
            description: "flat".to_string(),
            cost: 1,
            speed: 1,
        })
    }

    async fn score(
        &self,
        subgraph: &Graph,
        _topic: &Graph,
        _cancel: &CancellationToken,
    ) -> ComponentResult<Scores> {
        let mut scores: Scores = subgraph.nodes().map(|n| (n.uri.clone(), 1.0)).collect();
        scores.insert(Node::attribute("ip", "203.0.113.99").uri, 1.0);
        Ok(scores)
    }
}

/// Storage whose writes always fail
pub struct FailingStorage;

#[async_trait]
impl StorageInterface for FailingStorage {
    fn name(&self) -> &str {
        "failing-store"
    }

    async fn configure(&self) -> ComponentResult<InterfaceConfiguration> {
        Ok(InterfaceConfiguration {
            configured: true,
            description: "rejects every write".to_string(),
            cost: 1,
            speed: 1,
        })
    }

    async fn enrich(&self, _graph: &Graph, _cancel: &CancellationToken) -> ComponentResult<()> {
        Err(ComponentError::StorageWrite("disk full".to_string()))
    }

    async fn query(
        &self,
        _request: &QueryRequest,
        _cancel: &CancellationToken,
    ) -> ComponentResult<Graph> {
        Ok(Graph::new())
    }
}
