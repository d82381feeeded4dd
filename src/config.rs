//! YAML configuration
//!
//! ```yaml
//! log:
//!   level: info
//!   file: /var/log/threatgraph.log
//! run:
//!   max_cost: 5
//!   enrichment_timeout_secs: 20
//! query:
//!   max_depth: 3
//!   dont_follow: [enrichment, classification]
//! storage:
//!   default: sqlite
//!   sqlite_path: /var/lib/threatgraph/graph.db
//! scoring:
//!   default: topic-distance
//! enrichments:
//!   lookup:
//!     - name: c2-masterlist
//!       path: /srv/feeds/c2-masterlist.txt
//!   tld:
//!     enabled: true
//!     suffixes: [co.nz]
//! ```
//!
//! Every section and field is optional.

use crate::catalog::{Selection, MAX_RATING, MIN_RATING};
use crate::component::{QueryRequest, DEFAULT_DONT_FOLLOW, DEFAULT_MAX_DEPTH};
use crate::graph::Graph;
use crate::orchestrator::OrchestratorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatGraphConfig {
    pub log: LogConfig,
    pub run: RunConfig,
    pub query: QueryConfig,
    pub storage: StorageConfig,
    pub scoring: ScoringConfig,
    pub enrichments: EnrichmentsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when no environment filter is set
    pub level: String,
    /// Append log lines here instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_cost: u32,
    pub max_speed: u32,
    pub enrichment_timeout_secs: u64,
    pub storage_timeout_secs: u64,
    pub scoring_timeout_secs: u64,
    /// Defaults to the host's available parallelism
    pub max_concurrency: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let settings = OrchestratorSettings::default();
        Self {
            max_cost: MAX_RATING,
            max_speed: MAX_RATING,
            enrichment_timeout_secs: settings.enrichment_timeout.as_secs(),
            storage_timeout_secs: settings.storage_timeout.as_secs(),
            scoring_timeout_secs: settings.scoring_timeout.as_secs(),
            max_concurrency: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_depth: usize,
    pub dont_follow: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            dont_follow: DEFAULT_DONT_FOLLOW.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Interface made active at startup
    pub default: Option<String>,
    /// SQLite file; the `sqlite` interface is only registered when set
    /// or when `default` names it
    pub sqlite_path: Option<PathBuf>,
    /// Register the in-process `memory` interface
    pub memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default: Some("sqlite".to_string()),
            sqlite_path: None,
            memory: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub default: Option<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default: Some("topic-distance".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentsConfig {
    pub lookup: Vec<LookupTableConfig>,
    pub tld: TldConfig,
}

/// One local feed table served by a lookup enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTableConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_lookup_cost")]
    pub cost: u32,
    #[serde(default = "default_lookup_speed")]
    pub speed: u32,
}

fn default_lookup_cost() -> u32 {
    1
}

fn default_lookup_speed() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TldConfig {
    pub enabled: bool,
    /// Extra multi-label registry suffixes
    pub suffixes: Vec<String>,
}

impl Default for TldConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suffixes: Vec::new(),
        }
    }
}

impl ThreatGraphConfig {
    /// `<config dir>/threatgraph/threatgraph.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("threatgraph").join("threatgraph.yaml"))
    }

    /// `<data dir>/threatgraph/threatgraph.db`
    pub fn default_sqlite_path() -> PathBuf {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
        data_dir.join("threatgraph").join("threatgraph.db")
    }

    /// Load from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        // An empty document deserializes to unit, not a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [("max_cost", self.run.max_cost), ("max_speed", self.run.max_speed)] {
            if !(MIN_RATING..=MAX_RATING).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "run.{} must be between {} and {}, got {}",
                    field, MIN_RATING, MAX_RATING, value
                )));
            }
        }
        for (field, secs) in [
            ("enrichment_timeout_secs", self.run.enrichment_timeout_secs),
            ("storage_timeout_secs", self.run.storage_timeout_secs),
            ("scoring_timeout_secs", self.run.scoring_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("run.{} must be positive", field)));
            }
        }
        if self.run.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid(
                "run.max_concurrency must be positive".to_string(),
            ));
        }
        for table in &self.enrichments.lookup {
            if table.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "enrichments.lookup entries need a name".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn to_settings(&self) -> OrchestratorSettings {
        let defaults = OrchestratorSettings::default();
        OrchestratorSettings {
            enrichment_timeout: Duration::from_secs(self.run.enrichment_timeout_secs),
            storage_timeout: Duration::from_secs(self.run.storage_timeout_secs),
            scoring_timeout: Duration::from_secs(self.run.scoring_timeout_secs),
            max_concurrency: self.run.max_concurrency.unwrap_or(defaults.max_concurrency),
        }
    }

    /// Enrichment selection ceilings from `run`
    pub fn selection(&self) -> Selection {
        Selection::new()
            .max_cost(self.run.max_cost)
            .max_speed(self.run.max_speed)
    }

    /// Query request for `topic` with the configured depth and exclusions
    pub fn query_request(&self, topic: Graph) -> QueryRequest {
        QueryRequest::new(topic)
            .with_max_depth(self.query.max_depth)
            .with_dont_follow(self.query.dont_follow.iter().cloned())
    }

    /// Whether the `sqlite` interface should be registered
    pub fn wants_sqlite(&self) -> bool {
        self.storage.sqlite_path.is_some() || self.storage.default.as_deref() == Some("sqlite")
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.storage
            .sqlite_path
            .clone()
            .unwrap_or_else(Self::default_sqlite_path)
    }
}
