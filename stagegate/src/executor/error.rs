use crate::core::{Phase, WaitFor};
use crate::graph::DependencyError;
use std::time::Duration;
use thiserror::Error;

/// Error type returned by [`NodeLifecycle`](super::NodeLifecycle) implementations.
pub type LifecycleError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Deployment driver error type.
///
/// Every variant that concerns a single node carries the node name and the
/// phase it was in, so the error can be reported without extra context.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeployError {
    /// The scheduler rejected an operation (unknown node).
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// A lifecycle operation returned an error.
    #[error("{phase} of node {node} failed: {source}")]
    Lifecycle {
        node: String,
        phase: Phase,
        source: LifecycleError,
    },

    /// A lifecycle operation panicked.
    #[error("{phase} of node {node} panicked")]
    Panicked { node: String, phase: Phase },

    /// The phase did not finish within the configured timeout.
    #[error("{phase} of node {node} timed out after {after:?}")]
    Timeout {
        node: String,
        phase: Phase,
        after: Duration,
    },

    /// The deployment was cancelled while the node was in this phase.
    #[error("{phase} of node {node} cancelled")]
    Cancelled { node: String, phase: Phase },

    /// Prerequisites of the phase failed and degraded runs are disabled.
    #[error("{phase} of node {node} depends on failed stages: {}", join_wait_for(.failed))]
    PrerequisiteFailed {
        node: String,
        phase: Phase,
        failed: Vec<WaitFor>,
    },

    /// The admission semaphore was closed.
    #[error("admission limit closed")]
    AdmissionClosed,
}

impl DeployError {
    /// A lifecycle call of `node` failed during `phase`
    pub fn lifecycle(node: impl Into<String>, phase: Phase, source: LifecycleError) -> Self {
        Self::Lifecycle {
            node: node.into(),
            phase,
            source,
        }
    }

    /// A lifecycle call of `node` panicked during `phase`
    pub fn panicked(node: impl Into<String>, phase: Phase) -> Self {
        Self::Panicked {
            node: node.into(),
            phase,
        }
    }

    /// `phase` of `node` did not finish within `after`
    pub fn timeout(node: impl Into<String>, phase: Phase, after: Duration) -> Self {
        Self::Timeout {
            node: node.into(),
            phase,
            after,
        }
    }

    /// The run was cancelled while `node` was in `phase`
    pub fn cancelled(node: impl Into<String>, phase: Phase) -> Self {
        Self::Cancelled {
            node: node.into(),
            phase,
        }
    }

    /// `node` refused to enter `phase` because `failed` gave up
    pub fn prerequisite_failed(node: impl Into<String>, phase: Phase, failed: Vec<WaitFor>) -> Self {
        Self::PrerequisiteFailed {
            node: node.into(),
            phase,
            failed,
        }
    }

    /// Returns true if the error stems from cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

fn join_wait_for(failed: &[WaitFor]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
