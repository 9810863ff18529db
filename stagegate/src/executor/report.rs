use crate::core::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// How a single node's deployment ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum NodeOutcome {
    /// Every phase finished.
    Deployed,
    /// The node gave up in `phase`.
    Failed { phase: Phase, error: String },
    /// The run was cancelled while the node was in `phase`.
    Cancelled { phase: Phase },
    /// The node task itself died outside any lifecycle call.
    Panicked { error: String },
}

impl NodeOutcome {
    pub fn is_deployed(&self) -> bool {
        matches!(self, NodeOutcome::Deployed)
    }
}

/// Result of one [`Deployment::run`](super::Deployment::run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// Unique id of the run, also logged with every run event
    pub run_id: Uuid,
    /// When the first node task was spawned
    pub started_at: DateTime<Utc>,
    /// When the last node task finished
    pub finished_at: DateTime<Utc>,
    /// Outcome per node, keyed by node name
    pub nodes: BTreeMap<String, NodeOutcome>,
}

impl DeploymentReport {
    /// Returns true if every node was deployed
    pub fn is_success(&self) -> bool {
        self.nodes.values().all(NodeOutcome::is_deployed)
    }

    /// Returns the outcome of a node, if it was part of the run
    pub fn outcome(&self, node: &str) -> Option<&NodeOutcome> {
        self.nodes.get(node)
    }

    /// Names of the nodes that did not finish, in sorted order
    pub fn unfinished(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|(_, outcome)| !outcome.is_deployed())
            .map(|(name, _)| name.as_str())
    }

    /// Wall-clock duration of the run
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
