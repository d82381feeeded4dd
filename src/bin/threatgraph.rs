//! threatgraph CLI: enrich topics and query the knowledge graph.
//!
//! Usage:
//!   threatgraph catalog
//!   threatgraph enrich <topic> --type <type> [--store]
//!   threatgraph query <key=value>... [--depth N] [--score]

use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use threatgraph::config::ThreatGraphConfig;
use threatgraph::graph::{parse_topic_pair, time::parse_timestamp, topic_graph};
use threatgraph::{
    CancellationToken, Component, EnrichmentRequest, FeedSource, LookupEnrichment, MemoryStorage,
    Orchestrator, QueryEngine, SqliteStorage, TldEnrichment, TopicDistanceScorer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "threatgraph",
    version,
    about = "Threat-intelligence knowledge graph orchestrator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to YAML configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at info level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log at debug level
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every registered component
    Catalog,
    /// Run enrichments for a topic and print the merged graph
    Enrich {
        /// Value to enrich, e.g. an IP or domain
        topic: String,
        /// Topic type, e.g. ip or domain
        #[arg(long = "type")]
        topic_type: String,
        /// Only run these enrichments
        #[arg(long = "name")]
        names: Vec<String>,
        #[arg(long)]
        max_cost: Option<u32>,
        #[arg(long)]
        max_speed: Option<u32>,
        /// Observation time (ISO-8601)
        #[arg(long)]
        start_time: Option<String>,
        /// Merge the result into storage
        #[arg(long)]
        store: bool,
        /// Storage interface to use instead of the active one
        #[arg(long)]
        storage: Option<String>,
    },
    /// Query the subgraph around one or more topic nodes
    Query {
        /// Topic nodes as key=value
        #[arg(required = true)]
        topics: Vec<String>,
        #[arg(long)]
        depth: Option<usize>,
        /// Edge categories not to traverse (replaces the configured set)
        #[arg(long = "dont-follow")]
        dont_follow: Vec<String>,
        #[arg(long)]
        storage: Option<String>,
        /// Score the result nodes
        #[arg(long)]
        score: bool,
        /// Scoring plugin to use instead of the active one
        #[arg(long)]
        scorer: Option<String>,
    },
}

fn init_logging(config: &ThreatGraphConfig, verbose: bool, debug: bool) -> Result<(), String> {
    let level = if debug {
        "debug".to_string()
    } else if verbose {
        "info".to_string()
    } else {
        config.log.level.clone()
    };
    let filter = EnvFilter::try_from_env("THREATGRAPH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match &config.log.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file {}: {}", path.display(), e))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

/// Register every configured component and apply the default selections.
async fn build_orchestrator(config: &ThreatGraphConfig) -> Result<Orchestrator, String> {
    let mut orchestrator = Orchestrator::with_settings(config.to_settings());
    let mut components = Vec::new();

    for table in &config.enrichments.lookup {
        components.push(Component::enrichment(
            LookupEnrichment::new(&table.name, FeedSource::File(table.path.clone()))
                .with_ratings(table.cost, table.speed),
        ));
    }
    if config.enrichments.tld.enabled {
        components.push(Component::enrichment(
            TldEnrichment::default().with_suffixes(&config.enrichments.tld.suffixes),
        ));
    }
    if config.storage.memory {
        components.push(Component::storage(MemoryStorage::default()));
    }
    if config.wants_sqlite() {
        let path = config.sqlite_path();
        match SqliteStorage::open("sqlite", &path) {
            Ok(store) => components.push(Component::storage(store)),
            Err(e) => warn!(path = %path.display(), error = %e, "sqlite storage unavailable"),
        }
    }
    components.push(Component::scoring(TopicDistanceScorer::default()));

    for component in components {
        let name = component.name().to_string();
        if let Err(e) = orchestrator.register(component).await {
            warn!(component = %name, error = %e, "component skipped");
        }
    }
    if orchestrator.catalog().is_empty() {
        return Err("no components could be registered".to_string());
    }

    if let Some(name) = &config.storage.default {
        if let Err(e) = orchestrator.set_interface(name) {
            warn!(interface = %name, error = %e, "default storage interface not set");
        }
    }
    if let Some(name) = &config.scoring.default {
        if let Err(e) = orchestrator.set_scoring_plugin(name) {
            warn!(scorer = %name, error = %e, "default scoring plugin not set");
        }
    }
    Ok(orchestrator)
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_catalog(orchestrator: &Orchestrator) -> i32 {
    let catalog = orchestrator.catalog();
    if catalog.is_empty() {
        println!("No components registered.");
        return 0;
    }
    println!(
        "{:<24}  {:<18}  {:<10}  {:>4}  {:>5}  {:<16}  DESCRIPTION",
        "NAME", "CATEGORY", "CONFIGURED", "COST", "SPEED", "INPUTS"
    );
    println!("{}", "-".repeat(100));
    for entry in catalog.entries() {
        let inputs = entry
            .input_types
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<24}  {:<18}  {:<10}  {:>4}  {:>5}  {:<16}  {}",
            entry.name,
            entry.category.as_str(),
            entry.configured,
            entry.cost,
            entry.speed,
            inputs,
            entry.description
        );
    }
    0
}

#[allow(clippy::too_many_arguments)]
async fn cmd_enrich(
    orchestrator: &Orchestrator,
    config: &ThreatGraphConfig,
    topic: &str,
    topic_type: &str,
    names: Vec<String>,
    max_cost: Option<u32>,
    max_speed: Option<u32>,
    start_time: Option<String>,
    store: bool,
    storage: Option<String>,
) -> i32 {
    let start_time = match start_time.as_deref().map(parse_timestamp).transpose() {
        Ok(ts) => ts.flatten(),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut selection = config.selection();
    if let Some(cost) = max_cost {
        selection = selection.max_cost(cost);
    }
    if let Some(speed) = max_speed {
        selection = selection.max_speed(speed);
    }
    if !names.is_empty() {
        selection = selection.with_names(names);
    }

    let request = EnrichmentRequest::new(topic, topic_type).with_start_time(start_time);
    let cancel = CancellationToken::new();
    let run = match orchestrator
        .run_enrichments_with_report(&request, &selection, &cancel)
        .await
    {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    for outcome in run.failed() {
        info!(component = %outcome.name, status = %outcome.status, "component did not contribute");
    }

    if store {
        if let Err(e) = orchestrator
            .store_graph(&run.graph, storage.as_deref(), &cancel)
            .await
        {
            eprintln!("Error: {}", e);
            print_json(&run.graph);
            return 1;
        }
    }
    print_json(&run.graph)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_query(
    engine: &QueryEngine,
    config: &ThreatGraphConfig,
    topics: &[String],
    depth: Option<usize>,
    dont_follow: Vec<String>,
    storage: Option<String>,
    score: bool,
    scorer: Option<String>,
) -> i32 {
    let mut pairs = Vec::with_capacity(topics.len());
    for raw in topics {
        match parse_topic_pair(raw) {
            Some(pair) => pairs.push(pair),
            None => {
                eprintln!("Error: topic '{}' is not key=value", raw);
                return 1;
            }
        }
    }
    let topic = topic_graph(pairs);

    let mut request = config.query_request(topic.clone());
    if let Some(depth) = depth {
        request = request.with_max_depth(depth);
    }
    if !dont_follow.is_empty() {
        request = request.with_dont_follow(dont_follow);
    }

    let cancel = CancellationToken::new();
    let subgraph = match engine.run_query(&request, storage.as_deref(), &cancel).await {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if !score {
        return print_json(&subgraph);
    }

    match engine
        .score_subgraph(&topic, &subgraph, scorer.as_deref(), &cancel)
        .await
    {
        Ok(scores) => print_json(&serde_json::json!({
            "graph": subgraph,
            "scores": scores,
        })),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ThreatGraphConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = init_logging(&config, cli.verbose, cli.debug) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let orchestrator = match build_orchestrator(&config).await {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Catalog => cmd_catalog(&orchestrator),
        Commands::Enrich {
            topic,
            topic_type,
            names,
            max_cost,
            max_speed,
            start_time,
            store,
            storage,
        } => {
            cmd_enrich(
                &orchestrator,
                &config,
                &topic,
                &topic_type,
                names,
                max_cost,
                max_speed,
                start_time,
                store,
                storage,
            )
            .await
        }
        Commands::Query {
            topics,
            depth,
            dont_follow,
            storage,
            score,
            scorer,
        } => {
            let engine = QueryEngine::new(Arc::new(orchestrator));
            cmd_query(
                &engine,
                &config,
                &topics,
                depth,
                dont_follow,
                storage,
                score,
                scorer,
            )
            .await
        }
    };
    std::process::exit(code);
}
