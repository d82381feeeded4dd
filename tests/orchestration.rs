//! End-to-end orchestration: register, enrich, store, query, score.
//!
//! Run with: `cargo test --test orchestration`

mod common;

use common::{malware_fragment, ts, Behavior, FailingStorage, FlatScorer, MockEnrichment};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use threatgraph::graph::{key, topic_graph, Node};
use threatgraph::orchestrator::OutcomeStatus;
use threatgraph::{
    CancellationToken, Component, EnrichmentRequest, FeedSource, LookupEnrichment, MemoryStorage,
    Orchestrator, OrchestratorError, OrchestratorSettings, QueryEngine, QueryRequest, Selection,
    SqliteStorage, TldEnrichment, TopicDistanceScorer,
};

const FEED: &str = "\
# indicator,context,date,source
192.0.2.10,IP used by zeus C&C,2015-04-29,http://feed.test/zeus-ip.txt
evil.test,Domain used by zeus,2015-04-28,http://feed.test/zeus-domain.txt
";

fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        enrichment_timeout: Duration::from_millis(200),
        ..OrchestratorSettings::default()
    }
}

async fn feed_orchestrator(store: Arc<MemoryStorage>) -> Orchestrator {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .register(Component::enrichment(LookupEnrichment::new(
            "c2-feed",
            FeedSource::Inline(FEED.to_string()),
        )))
        .await
        .unwrap();
    orchestrator
        .register(Component::enrichment(TldEnrichment::default()))
        .await
        .unwrap();
    orchestrator.register(Component::Storage(store)).await.unwrap();
    orchestrator
        .register(Component::scoring(TopicDistanceScorer::default()))
        .await
        .unwrap();
    orchestrator.set_interface("memory").unwrap();
    orchestrator.set_scoring_plugin("topic-distance").unwrap();
    orchestrator
}

async fn enrich_and_store(orchestrator: &Orchestrator, topic: &str, topic_type: &str) {
    let cancel = CancellationToken::new();
    let graph = orchestrator
        .run_enrichments(&EnrichmentRequest::new(topic, topic_type), &Selection::new(), &cancel)
        .await
        .unwrap();
    orchestrator.store_graph(&graph, None, &cancel).await.unwrap();
}

// ============================================================================
// Catalog selection
// ============================================================================

#[tokio::test]
async fn selects_by_input_type_and_budget() {
    let mut orchestrator = Orchestrator::new();
    for component in [
        MockEnrichment::returning("A", &["ip"], Default::default()),
        MockEnrichment::returning("B", &["domain"], Default::default()),
        MockEnrichment::returning("C", &["ip"], Default::default()).ratings(7, 2),
    ] {
        orchestrator.register(Component::enrichment(component)).await.unwrap();
    }

    let selection = Selection::new().max_cost(5).max_speed(5);
    assert_eq!(
        orchestrator.enrichments(["ip"], &selection).into_iter().collect::<Vec<_>>(),
        ["A"]
    );
    // Raising the ceiling only adds candidates
    let wider = orchestrator.enrichments(["ip"], &Selection::new());
    assert!(wider.contains("A") && wider.contains("C"));
    assert_eq!(
        orchestrator.list_input_types().into_iter().collect::<Vec<_>>(),
        ["domain", "ip"]
    );
}

#[tokio::test]
async fn failed_configure_is_catalogued_but_never_selected() {
    let mut orchestrator = Orchestrator::new();
    let broken = MockEnrichment::returning("broken", &["ip"], Default::default()).broken();
    let calls = Arc::clone(&broken.calls);
    let entry = orchestrator
        .register(Component::enrichment(broken))
        .await
        .unwrap()
        .clone();
    assert!(!entry.configured);

    assert!(orchestrator.enrichments(["ip"], &Selection::new()).is_empty());
    assert!(orchestrator.catalog().entries().any(|e| e.name == "broken"));

    let run = orchestrator
        .run_enrichments_with_report(
            &EnrichmentRequest::new("10.0.0.1", "ip"),
            &Selection::new().require_configured(false),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(run.outcomes.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn not_ready_component_stays_visible() {
    let mut orchestrator = Orchestrator::new();
    let not_ready = MockEnrichment::returning("not_ready", &["ip"], Default::default()).not_ready();
    orchestrator
        .register(Component::enrichment(not_ready))
        .await
        .unwrap();

    let entry = orchestrator.catalog().get("not_ready").unwrap();
    assert!(!entry.configured);
    assert_eq!((entry.cost, entry.speed), (10, 10));
    assert!(orchestrator.enrichments(["ip"], &Selection::new()).is_empty());
    assert!(orchestrator
        .enrichments(["ip"], &Selection::new().require_configured(false))
        .contains("not_ready"));
}

// ============================================================================
// Fan-out / fan-in
// ============================================================================

async fn sleepers(settings: OrchestratorSettings) -> Orchestrator {
    let mut orchestrator = Orchestrator::with_settings(settings);
    for (name, malware) in [("s1", "zeus"), ("s2", "emotet"), ("s3", "qakbot")] {
        let fragment = malware_fragment("ip", "10.0.0.1", malware, name, None);
        orchestrator
            .register(Component::enrichment(MockEnrichment::new(
                name,
                &["ip"],
                Behavior::Sleep(Duration::from_millis(200), fragment),
            )))
            .await
            .unwrap();
    }
    orchestrator
}

#[tokio::test]
async fn enrichments_run_concurrently() {
    let orchestrator = sleepers(OrchestratorSettings {
        enrichment_timeout: Duration::from_secs(5),
        max_concurrency: 4,
        ..OrchestratorSettings::default()
    })
    .await;

    let started = Instant::now();
    let graph = orchestrator
        .run_enrichments(
            &EnrichmentRequest::new("10.0.0.1", "ip"),
            &Selection::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(graph.node_count(), 4);
    assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);
}

#[tokio::test]
async fn concurrency_limit_of_one_serializes() {
    let orchestrator = sleepers(OrchestratorSettings {
        enrichment_timeout: Duration::from_secs(5),
        max_concurrency: 1,
        ..OrchestratorSettings::default()
    })
    .await;

    let started = Instant::now();
    let run = orchestrator
        .run_enrichments_with_report(
            &EnrichmentRequest::new("10.0.0.1", "ip"),
            &Selection::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(run.succeeded().count(), 3);
    assert!(elapsed >= Duration::from_millis(600), "took {:?}", elapsed);
}

#[tokio::test]
async fn partial_failure_keeps_successful_fragments() {
    let mut orchestrator = Orchestrator::with_settings(fast_settings());
    let good = malware_fragment("ip", "10.0.0.1", "zeus", "good", ts(2015));
    let late = malware_fragment("ip", "10.0.0.1", "late", "slow", ts(2015));
    for component in [
        MockEnrichment::returning("good", &["ip"], good),
        MockEnrichment::new("failing", &["ip"], Behavior::Fail),
        MockEnrichment::new("panicky", &["ip"], Behavior::Panic),
        MockEnrichment::new("slow", &["ip"], Behavior::Sleep(Duration::from_secs(5), late)),
    ] {
        orchestrator.register(Component::enrichment(component)).await.unwrap();
    }

    let run = orchestrator
        .run_enrichments_with_report(
            &EnrichmentRequest::new("10.0.0.1", "ip"),
            &Selection::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(run.graph.node_count(), 2);
    assert_eq!(run.graph.edge_count(), 1);
    assert_eq!(run.succeeded().collect::<Vec<_>>(), ["good"]);

    let names: Vec<&str> = run.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["failing", "good", "panicky", "slow"]);
    assert!(matches!(run.outcomes[0].status, OutcomeStatus::Failed(_)));
    assert!(matches!(run.outcomes[2].status, OutcomeStatus::Failed(_)));
    assert!(matches!(run.outcomes[3].status, OutcomeStatus::TimedOut(_)));
}

#[tokio::test]
async fn fragments_merge_by_uri() {
    let mut orchestrator = Orchestrator::new();
    let f1 = malware_fragment("ip", "10.0.0.1", "zeus", "feed-a", ts(2015));
    let f2 = malware_fragment("ip", "10.0.0.1", "zeus", "feed-a", ts(2013));
    let f3 = malware_fragment("ip", "10.0.0.1", "zeus", "feed-b", ts(2014));
    for (name, fragment) in [("f1", f1), ("f2", f2), ("f3", f3)] {
        orchestrator
            .register(Component::enrichment(MockEnrichment::returning(name, &["ip"], fragment)))
            .await
            .unwrap();
    }

    let graph = orchestrator
        .run_enrichments(
            &EnrichmentRequest::new("10.0.0.1", "ip"),
            &Selection::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // One node per triple, earliest start wins
    assert_eq!(graph.node_count(), 2);
    let ip = graph.get_node(&Node::attribute("ip", "10.0.0.1").uri).unwrap();
    assert_eq!(ip.start_time, ts(2013));

    // Same endpoints, different origin: two edges
    assert_eq!(graph.edge_count(), 2);
    let origins: Vec<&str> = graph.edges().map(|e| e.origin.as_str()).collect();
    assert!(origins.contains(&"feed-a") && origins.contains(&"feed-b"));
}

#[tokio::test]
async fn cancellation_stops_waiting() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .register(Component::enrichment(MockEnrichment::new(
            "stuck",
            &["ip"],
            Behavior::AwaitCancel,
        )))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = orchestrator
        .run_enrichments(&EnrichmentRequest::new("10.0.0.1", "ip"), &Selection::new(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Cancelled));
}

// ============================================================================
// Active selection and storage
// ============================================================================

#[tokio::test]
async fn unregistered_interface_leaves_selection_unchanged() {
    let store = Arc::new(MemoryStorage::default());
    let orchestrator = feed_orchestrator(store).await;

    let err = orchestrator.set_interface("unregistered").unwrap_err();
    assert!(matches!(err, OrchestratorError::InterfaceNotConfigured(_)));
    assert_eq!(orchestrator.default_interface().as_deref(), Some("memory"));

    // A scorer is not a storage interface
    assert!(orchestrator.set_interface("topic-distance").is_err());
}

#[tokio::test]
async fn storing_without_interface_fails() {
    let orchestrator = Orchestrator::new();
    let graph = malware_fragment("ip", "10.0.0.1", "zeus", "feed", None);
    let err = orchestrator
        .store_graph(&graph, None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoStorageConfigured));
}

#[tokio::test]
async fn failed_store_reports_interface_and_keeps_graph() {
    let mut orchestrator = Orchestrator::new();
    orchestrator
        .register(Component::storage(FailingStorage))
        .await
        .unwrap();
    orchestrator.set_interface("failing-store").unwrap();

    let graph = malware_fragment("ip", "10.0.0.1", "zeus", "feed", None);
    let err = orchestrator
        .store_graph(&graph, None, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        OrchestratorError::StorageWrite { name, reason } => {
            assert_eq!(name, "failing-store");
            assert!(reason.contains("disk full"), "reason: {}", reason);
        }
        other => panic!("expected StorageWrite, got {:?}", other),
    }
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let store = Arc::new(MemoryStorage::default());
    let orchestrator = feed_orchestrator(Arc::clone(&store)).await;
    let request = EnrichmentRequest::new("192.0.2.10", "ip");
    let cancel = CancellationToken::new();

    let first = orchestrator
        .run_enrichments(&request, &Selection::new(), &cancel)
        .await
        .unwrap();
    orchestrator.store_graph(&first, None, &cancel).await.unwrap();
    let after_first = store.snapshot();

    let second = orchestrator
        .run_enrichments(&request, &Selection::new(), &cancel)
        .await
        .unwrap();
    orchestrator.store_graph(&second, None, &cancel).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.snapshot(), after_first);
}

// ============================================================================
// Queries and scoring
// ============================================================================

#[tokio::test]
async fn query_respects_depth_and_dont_follow() {
    let store = Arc::new(MemoryStorage::default());
    let orchestrator = feed_orchestrator(store).await;
    enrich_and_store(&orchestrator, "192.0.2.10", "ip").await;
    enrich_and_store(&orchestrator, "evil.test", "domain").await;

    let engine = QueryEngine::new(Arc::new(orchestrator));
    let cancel = CancellationToken::new();
    let topic = topic_graph([("ip", "192.0.2.10")]);

    let near = engine
        .run_query(&QueryRequest::new(topic.clone()).with_max_depth(1), None, &cancel)
        .await
        .unwrap();
    assert_eq!(near.node_count(), 2);
    assert_eq!(near.edge_count(), 1);

    let request = QueryRequest::new(topic.clone()).with_max_depth(2);
    let wide = engine.run_query(&request, None, &cancel).await.unwrap();
    assert_eq!(wide.node_count(), 3);
    assert_eq!(wide.edge_count(), 2);
    assert!(wide.nodes().all(|n| n.topic_distance().is_some_and(|d| d <= 2)));
    assert!(wide
        .nodes()
        .all(|n| n.key != key::CLASSIFICATION && n.key != key::ENRICHMENT));
    assert!(wide.contains_node(&Node::attribute("domain", "evil.test").uri));

    let scores = engine.score_subgraph(&topic, &wide, None, &cancel).await.unwrap();
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[&Node::attribute("ip", "192.0.2.10").uri], 1.0);
    assert_eq!(scores[&Node::attribute("malware", "zeus").uri], 0.5);
}

#[tokio::test]
async fn empty_dont_follow_reaches_classifications() {
    let store = Arc::new(MemoryStorage::default());
    let orchestrator = feed_orchestrator(store).await;
    enrich_and_store(&orchestrator, "192.0.2.10", "ip").await;

    let engine = QueryEngine::new(Arc::new(orchestrator));
    let request = QueryRequest::new(topic_graph([("ip", "192.0.2.10")]))
        .with_max_depth(1)
        .with_dont_follow(Vec::<String>::new());
    let result = engine
        .run_query(&request, None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.contains_node(&Node::attribute("classification", "c2").uri));
    assert!(result.contains_node(&Node::attribute("enrichment", "c2-feed").uri));
}

#[tokio::test]
async fn scores_outside_subgraph_are_discarded() {
    let mut orchestrator = Orchestrator::new();
    orchestrator.register(Component::scoring(FlatScorer)).await.unwrap();
    let engine = QueryEngine::new(Arc::new(orchestrator));

    let subgraph = malware_fragment("ip", "10.0.0.1", "zeus", "feed", None);
    let topic = topic_graph([("ip", "10.0.0.1")]);
    let cancel = CancellationToken::new();

    // Nothing is active and no name given
    assert!(matches!(
        engine.score_subgraph(&topic, &subgraph, None, &cancel).await,
        Err(OrchestratorError::ScoringPluginNotConfigured(_))
    ));

    let scores = engine
        .score_subgraph(&topic, &subgraph, Some("flat"), &cancel)
        .await
        .unwrap();
    assert_eq!(scores.len(), 2);
    assert!(scores.values().all(|s| *s == 1.0));
}

#[tokio::test]
async fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.db");

    {
        let mut orchestrator = Orchestrator::new();
        orchestrator
            .register(Component::enrichment(LookupEnrichment::new(
                "c2-feed",
                FeedSource::Inline(FEED.to_string()),
            )))
            .await
            .unwrap();
        orchestrator
            .register(Component::storage(SqliteStorage::open("sqlite", &path).unwrap()))
            .await
            .unwrap();
        orchestrator.set_interface("sqlite").unwrap();
        enrich_and_store(&orchestrator, "192.0.2.10", "ip").await;
        enrich_and_store(&orchestrator, "evil.test", "domain").await;
    }

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .register(Component::storage(SqliteStorage::open("sqlite", &path).unwrap()))
        .await
        .unwrap();
    let engine = QueryEngine::new(Arc::new(orchestrator));

    let request = QueryRequest::new(topic_graph([("domain", "evil.test")])).with_max_depth(2);
    let result = engine
        .run_query(&request, Some("sqlite"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.node_count(), 3);
    let zeus = result.get_node(&Node::attribute("malware", "zeus").uri).unwrap();
    assert_eq!(zeus.topic_distance(), Some(1));
    let ip = result.get_node(&Node::attribute("ip", "192.0.2.10").uri).unwrap();
    assert_eq!(ip.topic_distance(), Some(2));
}
