use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a node does to its dependers when one of its phases fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Signal the failed phase and every later phase as failed, so dependers
    /// are admitted with [`Admission::Degraded`](crate::graph::Admission::Degraded).
    #[default]
    Unblock,
    /// Signal nothing; dependers stay blocked until they time out or the
    /// run is cancelled.
    Hold,
}

/// Settings of a [`Deployment`](super::Deployment) run.
///
/// # Example
///
/// ```
/// use stagegate::executor::{DeployConfig, FailurePolicy};
/// use std::time::Duration;
///
/// let config = DeployConfig::default()
///     .with_max_concurrency(4)
///     .with_phase_timeout(Duration::from_secs(300))
///     .with_failure_policy(FailurePolicy::Hold);
///
/// assert_eq!(config.max_concurrency, Some(4));
/// assert!(config.proceed_degraded);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeployConfig {
    /// Maximum number of nodes doing create, create-links or configure work
    /// at the same time.
    ///
    /// `None` or `0` means unlimited. Nodes only hold a slot while working,
    /// never while waiting on a dependency.
    ///
    /// Default: `None`
    pub max_concurrency: Option<usize>,

    /// Upper bound applied separately to the dependency wait, the admission
    /// wait and the work of each phase.
    ///
    /// Default: `None` (wait forever)
    pub phase_timeout: Option<Duration>,

    /// Interval between `is_healthy`, `is_exited` and `is_running` probes.
    ///
    /// Default: 1 second
    pub poll_interval: Duration,

    /// Default: [`FailurePolicy::Unblock`]
    pub failure_policy: FailurePolicy,

    /// Whether a node admitted with failed prerequisites keeps deploying.
    ///
    /// Default: `true`
    pub proceed_degraded: bool,
}

impl DeployConfig {
    /// Limits concurrent create, create-links and configure work; `0` lifts the limit
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    /// Bounds each wait and each piece of work of a phase
    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = Some(timeout);
        self
    }

    /// Sets the delay between two probes of the runtime
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets what happens to dependers of a node that gives up
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets whether nodes admitted with failed prerequisites keep deploying
    pub fn with_proceed_degraded(mut self, proceed: bool) -> Self {
        self.proceed_degraded = proceed;
        self
    }

    /// The effective concurrency limit, with `0` treated as unlimited
    pub(crate) fn admission_limit(&self) -> Option<usize> {
        self.max_concurrency.filter(|max| *max > 0)
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            phase_timeout: None,
            poll_interval: Duration::from_secs(1),
            failure_policy: FailurePolicy::default(),
            proceed_degraded: true,
        }
    }
}
