//! Orchestrator: registration, selection, fan-out and merge
//!
//! Registration takes `&mut self`, so the catalog is only ever written
//! while nothing else can observe it. After that the orchestrator is
//! shared read-only (typically behind an `Arc`); only the active
//! storage/scoring selection changes, under its own lock.

use super::error::{OrchestratorError, OrchestratorResult};
use super::report::{ComponentOutcome, EnrichmentRun, OutcomeStatus};
use crate::catalog::{Catalog, CatalogEntry, ComponentCategory, Selection};
use crate::component::{
    CancellationToken, Component, ComponentError, Enrichment, EnrichmentRequest, Scorer,
    StorageInterface,
};
use crate::graph::Graph;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Timeouts and concurrency for component calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub enrichment_timeout: Duration,
    pub storage_timeout: Duration,
    pub scoring_timeout: Duration,
    /// Upper bound on enrichments running at once
    pub max_concurrency: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            enrichment_timeout: Duration::from_secs(30),
            storage_timeout: Duration::from_secs(60),
            scoring_timeout: Duration::from_secs(30),
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

#[derive(Debug, Default)]
struct ActiveSelection {
    storage: Option<String>,
    scoring: Option<String>,
}

/// Owns the catalog and component instances and runs enrichments
pub struct Orchestrator {
    catalog: Catalog,
    enrichments: BTreeMap<String, Arc<dyn Enrichment>>,
    storage: BTreeMap<String, Arc<dyn StorageInterface>>,
    scorers: BTreeMap<String, Arc<dyn Scorer>>,
    active: RwLock<ActiveSelection>,
    settings: OrchestratorSettings,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::with_settings(OrchestratorSettings::default())
    }

    pub fn with_settings(settings: OrchestratorSettings) -> Self {
        Self {
            catalog: Catalog::new(),
            enrichments: BTreeMap::new(),
            storage: BTreeMap::new(),
            scorers: BTreeMap::new(),
            active: RwLock::new(ActiveSelection::default()),
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // --- Registration ---

    /// Configure a component and record it in the catalog.
    ///
    /// A `configure` error, panic or out-of-range rating is recorded as
    /// `configured = false` under the component's name, with ratings
    /// pinned to the maximum. A row the catalog rejects (category conflict)
    /// is returned as an error and the instance is not kept.
    ///
    /// Re-registering the active storage or scoring component as
    /// unconfigured clears that selection.
    pub async fn register(&mut self, component: Component) -> OrchestratorResult<&CatalogEntry> {
        let name = component.name().to_string();
        let category = component.category();

        let mut entry = match configure(component.clone(), self.settings.enrichment_timeout).await {
            Ok(entry) => entry,
            Err(reason) => {
                warn!(component = %name, %category, %reason, "configuration failed");
                CatalogEntry::unconfigured(&name, category)
            }
        };
        let (cost, speed) = (entry.cost, entry.speed);
        if entry.clamp_ratings() {
            warn!(component = %name, cost, speed, "ratings out of range, recorded as unconfigured");
        }
        let configured = entry.configured;

        if let Err(e) = self.catalog.register(entry) {
            warn!(component = %name, error = %e, "registration rejected");
            return Err(e.into());
        }

        match component {
            Component::Enrichment(c) => {
                self.enrichments.insert(name.clone(), c);
            }
            Component::Storage(c) => {
                self.storage.insert(name.clone(), c);
            }
            Component::Scoring(c) => {
                self.scorers.insert(name.clone(), c);
            }
        }

        if !configured {
            self.clear_active(&name);
        }

        let entry = self
            .catalog
            .get(&name)
            .ok_or_else(|| OrchestratorError::ComponentNotFound(name.clone()))?;
        debug!(component = %name, %category, configured = entry.configured, "registered");
        Ok(entry)
    }

    // --- Catalog passthroughs ---

    pub fn list_input_types(&self) -> BTreeSet<String> {
        self.catalog.list_input_types()
    }

    pub fn enrichments<I, S>(&self, input_types: I, selection: &Selection) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.catalog.select_enrichments(input_types, selection)
    }

    pub fn interfaces(&self, require_configured: Option<bool>) -> BTreeSet<String> {
        self.catalog.list_storage(require_configured)
    }

    pub fn scoring_plugins(&self, selection: &Selection) -> BTreeSet<String> {
        self.catalog.select_scoring(selection)
    }

    // --- Active selection ---

    /// Make `name` the active storage interface.
    ///
    /// Fails, leaving the current selection untouched, unless `name` is a
    /// configured storage interface.
    pub fn set_interface(&self, name: &str) -> OrchestratorResult<()> {
        if !self
            .catalog
            .is_configured_as(name, ComponentCategory::StorageInterface)
        {
            return Err(OrchestratorError::InterfaceNotConfigured(name.to_string()));
        }
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.storage = Some(name.to_string());
        info!(interface = %name, "active storage interface set");
        Ok(())
    }

    /// Make `name` the active scoring plugin.
    pub fn set_scoring_plugin(&self, name: &str) -> OrchestratorResult<()> {
        if !self.catalog.is_configured_as(name, ComponentCategory::Scoring) {
            return Err(OrchestratorError::ScoringPluginNotConfigured(name.to_string()));
        }
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.scoring = Some(name.to_string());
        info!(scorer = %name, "active scoring plugin set");
        Ok(())
    }

    fn clear_active(&self, name: &str) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.storage.as_deref() == Some(name) {
            active.storage = None;
            warn!(interface = %name, "active storage interface no longer configured, cleared");
        }
        if active.scoring.as_deref() == Some(name) {
            active.scoring = None;
            warn!(scorer = %name, "active scoring plugin no longer configured, cleared");
        }
    }

    pub fn default_interface(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .storage
            .clone()
    }

    pub fn default_scoring_plugin(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .scoring
            .clone()
    }

    /// The given storage interface, or the active one.
    ///
    /// An explicit name must be a configured storage interface; it never
    /// falls back to the active selection.
    pub fn resolve_storage(
        &self,
        name: Option<&str>,
    ) -> OrchestratorResult<(String, Arc<dyn StorageInterface>)> {
        let name = match name {
            Some(name) => {
                if !self
                    .catalog
                    .is_configured_as(name, ComponentCategory::StorageInterface)
                {
                    return Err(OrchestratorError::InterfaceNotConfigured(name.to_string()));
                }
                name.to_string()
            }
            None => self
                .default_interface()
                .ok_or(OrchestratorError::NoStorageConfigured)?,
        };
        let interface = self
            .storage
            .get(&name)
            .cloned()
            .ok_or_else(|| OrchestratorError::ComponentNotFound(name.clone()))?;
        Ok((name, interface))
    }

    /// The given scoring plugin, or the active one.
    pub fn resolve_scoring(&self, name: Option<&str>) -> OrchestratorResult<(String, Arc<dyn Scorer>)> {
        let name = match name {
            Some(name) => {
                if !self.catalog.is_configured_as(name, ComponentCategory::Scoring) {
                    return Err(OrchestratorError::ScoringPluginNotConfigured(name.to_string()));
                }
                name.to_string()
            }
            None => self.default_scoring_plugin().ok_or_else(|| {
                OrchestratorError::ScoringPluginNotConfigured("<none selected>".to_string())
            })?,
        };
        let scorer = self
            .scorers
            .get(&name)
            .cloned()
            .ok_or_else(|| OrchestratorError::ComponentNotFound(name.clone()))?;
        Ok((name, scorer))
    }

    // --- Enrichment runs ---

    /// Run every matching enrichment and return the merged fragment.
    ///
    /// Individual component failures are logged and skipped. Nothing is
    /// persisted.
    pub async fn run_enrichments(
        &self,
        request: &EnrichmentRequest,
        selection: &Selection,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Graph> {
        self.run_enrichments_with_report(request, selection, cancel)
            .await
            .map(|run| run.graph)
    }

    /// Like [`run_enrichments`](Self::run_enrichments), also reporting each
    /// candidate's outcome.
    pub async fn run_enrichments_with_report(
        &self,
        request: &EnrichmentRequest,
        selection: &Selection,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<EnrichmentRun> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let selection = selection.clone().require_configured(true);
        let candidates = self
            .catalog
            .select_enrichments([request.topic_type.as_str()], &selection);

        if candidates.is_empty() {
            warn!(
                topic = %request.topic,
                topic_type = %request.topic_type,
                "no enrichment candidates for topic"
            );
            return Ok(EnrichmentRun {
                graph: Graph::new(),
                outcomes: Vec::new(),
            });
        }
        debug!(topic = %request.topic, candidates = ?candidates, "running enrichments");

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let timeout = self.settings.enrichment_timeout;
        let mut handles = Vec::with_capacity(candidates.len());

        for name in candidates {
            let Some(component) = self.enrichments.get(&name).cloned() else {
                warn!(component = %name, "catalogued enrichment has no instance");
                continue;
            };
            let request = request.clone();
            let token = cancel.clone();
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| CallFailure::Failed(e.to_string()))?;
                match tokio::time::timeout(timeout, component.run(&request, &token)).await {
                    Ok(Ok(fragment)) => Ok(fragment),
                    Ok(Err(e)) => Err(CallFailure::Failed(e.to_string())),
                    Err(_) => Err(CallFailure::TimedOut(timeout)),
                }
            });
            handles.push((name, handle));
        }

        // Fan-in: wait for every task, then merge in name order
        let mut finished = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(topic = %request.topic, "enrichment run cancelled");
                    return Err(OrchestratorError::Cancelled);
                }
                joined = handle => joined,
            };
            let result = joined.unwrap_or_else(|e| {
                if e.is_panic() {
                    Err(CallFailure::Failed("component panicked".to_string()))
                } else {
                    Err(CallFailure::Failed(e.to_string()))
                }
            });
            finished.push((name, result));
        }

        let mut graph = Graph::new();
        let mut outcomes = Vec::with_capacity(finished.len());
        for (name, result) in finished {
            let status = match result {
                Ok(fragment) => {
                    let status = OutcomeStatus::Succeeded {
                        nodes: fragment.node_count(),
                        edges: fragment.edge_count(),
                    };
                    let stats = graph.merge(fragment);
                    debug!(component = %name, ?stats, "merged fragment");
                    status
                }
                Err(CallFailure::Failed(reason)) => {
                    warn!(component = %name, %reason, "enrichment failed, skipping");
                    OutcomeStatus::Failed(reason)
                }
                Err(CallFailure::TimedOut(after)) => {
                    warn!(component = %name, seconds = after.as_secs(), "enrichment timed out, skipping");
                    OutcomeStatus::TimedOut(after)
                }
            };
            outcomes.push(ComponentOutcome { name, status });
        }

        info!(
            topic = %request.topic,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "enrichment run complete"
        );
        Ok(EnrichmentRun { graph, outcomes })
    }

    /// Merge `graph` into the given or active storage interface.
    ///
    /// On failure the caller still holds `graph`.
    pub async fn store_graph(
        &self,
        graph: &Graph,
        storage_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let (name, interface) = self.resolve_storage(storage_name)?;
        let result = self
            .call(
                &name,
                self.settings.storage_timeout,
                cancel,
                interface.enrich(graph, cancel),
            )
            .await;

        match result {
            Ok(()) => {
                info!(
                    interface = %name,
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    "graph stored"
                );
                Ok(())
            }
            Err(OrchestratorError::ComponentInvocation { name, reason }) => {
                Err(OrchestratorError::StorageWrite { name, reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Await a component call under a timeout, honoring cancellation.
    pub(crate) async fn call<T, F>(
        &self,
        name: &str,
        timeout: Duration,
        cancel: &CancellationToken,
        fut: F,
    ) -> OrchestratorResult<T>
    where
        F: Future<Output = Result<T, ComponentError>>,
    {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
            outcome = tokio::time::timeout(timeout, fut) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(ComponentError::Cancelled)) => Err(OrchestratorError::Cancelled),
                Ok(Err(e)) => Err(OrchestratorError::ComponentInvocation {
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
                Err(_) => Err(OrchestratorError::Timeout {
                    name: name.to_string(),
                    seconds: timeout.as_secs(),
                }),
            },
        }
    }
}

enum CallFailure {
    Failed(String),
    TimedOut(Duration),
}

/// Run `configure` in its own task so a panic is contained.
async fn configure(component: Component, timeout: Duration) -> Result<CatalogEntry, String> {
    let name = component.name().to_string();
    let task = tokio::spawn(async move {
        match &component {
            Component::Enrichment(c) => c.configure().await.map(|cfg| cfg.into_entry(c.name())),
            Component::Storage(c) => c
                .configure()
                .await
                .map(|cfg| cfg.into_entry(c.name(), ComponentCategory::StorageInterface)),
            Component::Scoring(c) => c
                .configure()
                .await
                .map(|cfg| cfg.into_entry(c.name(), ComponentCategory::Scoring)),
        }
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(entry))) => Ok(entry),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(e)) if e.is_panic() => Err(format!("'{}' panicked during configure", name)),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("configure timed out after {}s", timeout.as_secs())),
    }
}
