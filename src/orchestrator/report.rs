//! Per-run outcome report

use crate::graph::Graph;
use std::fmt;
use std::time::Duration;

/// How one component call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded { nodes: usize, edges: usize },
    Failed(String),
    TimedOut(Duration),
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Succeeded { .. })
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Succeeded { nodes, edges } => {
                write!(f, "ok ({} nodes, {} edges)", nodes, edges)
            }
            OutcomeStatus::Failed(reason) => write!(f, "failed: {}", reason),
            OutcomeStatus::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentOutcome {
    pub name: String,
    pub status: OutcomeStatus,
}

/// Merged graph of one enrichment run plus what happened to each candidate
#[derive(Debug, Clone)]
pub struct EnrichmentRun {
    pub graph: Graph,
    /// One entry per candidate, in name order
    pub outcomes: Vec<ComponentOutcome>,
}

impl EnrichmentRun {
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .map(|o| o.name.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ComponentOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }
}
