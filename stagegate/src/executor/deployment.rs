//! Stage-driven deployment
//!
//! One tokio task per node walks the phases in [`Phase::ALL`] order. Each
//! phase is bracketed the same way:
//!
//! ```text
//! enter(phase) -> permit -> on-enter commands -> work -> on-exit commands -> signal_done(phase)
//! ```
//!
//! `healthy` and `exit` are probe phases. `healthy` is polled if another node
//! waits on it or it has stage commands; `exit` only if another node waits on
//! it, and its stage commands are skipped otherwise. A node sharing the
//! network namespace of an external container waits for that container to
//! run after entering `create`. The admission permit is taken for create, create-links and configure work
//! only, and never held across an `enter` wait.

use super::config::{DeployConfig, FailurePolicy};
use super::error::{DeployError, LifecycleError};
use super::lifecycle::NodeLifecycle;
use super::report::{DeploymentReport, NodeOutcome};
use crate::core::{Phase, StageCommand, Stages};
use crate::graph::{Admission, DependencyScheduler};
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

/// A single deployment run over a frozen dependency graph.
///
/// Gates are spent as nodes signal, so a scheduler drives exactly one run;
/// [`Deployment::new`] takes it by value.
///
/// # Example
///
/// ```ignore
/// let lab = LabDefinition::from_path("lab.clab.yml")?;
/// let scheduler = lab.topology.build_manager()?.freeze()?;
/// let deployment = Deployment::new(
///     scheduler,
///     lab.topology.stages_by_node()?,
///     Arc::new(DockerLifecycle::new()),
///     DeployConfig::default().with_max_concurrency(8),
/// );
///
/// let report = deployment.run(CancellationToken::new()).await;
/// ```
pub struct Deployment<L: NodeLifecycle> {
    scheduler: Arc<DependencyScheduler>,
    stages: BTreeMap<String, Stages>,
    lifecycle: Arc<L>,
    config: DeployConfig,
    external_peers: BTreeMap<String, String>,
}

impl<L: NodeLifecycle> Deployment<L> {
    /// Prepares a run.
    ///
    /// Nodes missing from `stages_by_node` run with empty stages.
    pub fn new(
        scheduler: DependencyScheduler,
        stages_by_node: BTreeMap<String, Stages>,
        lifecycle: Arc<L>,
        config: DeployConfig,
    ) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
            stages: stages_by_node,
            lifecycle,
            config,
            external_peers: BTreeMap::new(),
        }
    }

    /// Sets the external containers nodes share a network namespace with,
    /// keyed by node name, as returned by
    /// [`Topology::external_peers`](crate::topology::Topology::external_peers).
    pub fn with_external_peers(mut self, peers: BTreeMap<String, String>) -> Self {
        self.external_peers = peers;
        self
    }

    /// Deploys every node and waits for all node tasks to finish.
    ///
    /// Cancelling `cancel` makes every task abandon its current wait or
    /// work; those nodes are reported as [`NodeOutcome::Cancelled`].
    pub async fn run(mut self, cancel: CancellationToken) -> DeploymentReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let limit = self.config.admission_limit();
        let admission = limit.map(|max| Arc::new(Semaphore::new(max)));

        let names: Vec<String> = self.scheduler.node_names().map(str::to_string).collect();
        for name in self.stages.keys().filter(|name| !names.contains(name)) {
            warn!("stages defined for {}, which is not in the dependency graph; ignored", name);
        }

        info!(
            %run_id,
            nodes = names.len(),
            max_concurrency = ?limit,
            "starting deployment"
        );

        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let task = NodeTask {
                    name: name.clone(),
                    stages: self.stages.remove(name).unwrap_or_default(),
                    external_peer: self.external_peers.remove(name),
                    scheduler: Arc::clone(&self.scheduler),
                    lifecycle: Arc::clone(&self.lifecycle),
                    config: self.config.clone(),
                    admission: admission.clone(),
                    cancel: cancel.clone(),
                };
                tokio::spawn(task.run().instrument(info_span!("node", name = %name)))
            })
            .collect();

        let results = join_all(handles).await;

        let nodes: BTreeMap<String, NodeOutcome> = names
            .into_iter()
            .zip(results)
            .map(|(name, joined)| {
                let outcome = joined.unwrap_or_else(|err| {
                    error!("deployment task of node {} died: {}", name, err);
                    NodeOutcome::Panicked {
                        error: err.to_string(),
                    }
                });
                (name, outcome)
            })
            .collect();

        let report = DeploymentReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            nodes,
        };

        info!(
            %run_id,
            deployed = report.nodes.values().filter(|o| o.is_deployed()).count(),
            unfinished = report.unfinished().count(),
            elapsed_ms = report.elapsed().num_milliseconds(),
            "deployment finished"
        );
        report
    }
}

struct NodeTask<L: NodeLifecycle> {
    name: String,
    stages: Stages,
    external_peer: Option<String>,
    scheduler: Arc<DependencyScheduler>,
    lifecycle: Arc<L>,
    config: DeployConfig,
    admission: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl<L: NodeLifecycle> NodeTask<L> {
    async fn run(self) -> NodeOutcome {
        for phase in Phase::ALL {
            if let Err(err) = self.run_phase(phase).await {
                return self.give_up(phase, err);
            }
        }

        info!("node deployed");
        NodeOutcome::Deployed
    }

    async fn run_phase(&self, phase: Phase) -> Result<(), DeployError> {
        let admission = self
            .guarded(phase, async {
                self.scheduler
                    .enter(&self.name, phase)
                    .await
                    .map_err(DeployError::from)
            })
            .await?;

        if let Admission::Degraded { failed } = admission {
            if !self.config.proceed_degraded {
                return Err(DeployError::prerequisite_failed(&self.name, phase, failed));
            }
            warn!(%phase, ?failed, "entering phase although prerequisites failed");
        }

        if phase == Phase::Create {
            if let Some(peer) = &self.external_peer {
                self.guarded(phase, self.wait_for_external_peer(peer)).await?;
            }
        }

        if is_probe(phase) && !self.must_observe(phase)? {
            trace!(%phase, "nothing depends on phase, not probing");
            self.scheduler.signal_done(&self.name, phase);
            return Ok(());
        }

        let permit = if is_probe(phase) {
            None
        } else {
            self.acquire(phase).await?
        };

        let stage = self.stages.get(phase);
        self.guarded(phase, async {
            self.run_commands(phase, "on-enter", &stage.on_enter).await;
            self.work(phase).await?;
            self.run_commands(phase, "on-exit", &stage.on_exit).await;
            Ok::<(), DeployError>(())
        })
        .await?;

        drop(permit);
        self.scheduler.signal_done(&self.name, phase);
        Ok(())
    }

    fn must_observe(&self, phase: Phase) -> Result<bool, DeployError> {
        if self.scheduler.must_wait(&self.name, phase)? {
            return Ok(true);
        }
        match phase {
            Phase::Healthy => Ok(self.stages.has_commands(phase)),
            _ => {
                if self.stages.has_commands(phase) {
                    debug!(%phase, "nothing waits on phase, skipping its stage commands");
                }
                Ok(false)
            }
        }
    }

    async fn wait_for_external_peer(&self, peer: &str) -> Result<(), DeployError> {
        debug!(peer, "waiting for external container to run");
        loop {
            let running = self
                .lifecycle
                .is_running(peer)
                .await
                .map_err(|source| DeployError::lifecycle(&self.name, Phase::Create, source))?;
            if running {
                info!(peer, "external container is running");
                return Ok(());
            }

            trace!(peer, "external container not running, checking again in {:?}", self.config.poll_interval);
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn acquire(&self, phase: Phase) -> Result<Option<OwnedSemaphorePermit>, DeployError> {
        let Some(semaphore) = self.admission.as_ref().map(Arc::clone) else {
            return Ok(None);
        };

        self.guarded(phase, async move {
            semaphore
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| DeployError::AdmissionClosed)
        })
        .await
    }

    async fn work(&self, phase: Phase) -> Result<(), DeployError> {
        let name = self.name.as_str();
        let call = async {
            match phase {
                Phase::Create => self.lifecycle.create(name).await,
                Phase::CreateLinks => self.lifecycle.create_links(name).await,
                Phase::Configure => self.lifecycle.configure(name).await,
                Phase::Healthy | Phase::Exit => self.probe(phase).await,
            }
        };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result.map_err(|source| DeployError::lifecycle(name, phase, source)),
            Err(_) => Err(DeployError::panicked(name, phase)),
        }
    }

    async fn probe(&self, phase: Phase) -> Result<(), LifecycleError> {
        loop {
            let reached = match phase {
                Phase::Exit => self.lifecycle.is_exited(&self.name).await?,
                _ => self.lifecycle.is_healthy(&self.name).await?,
            };
            if reached {
                return Ok(());
            }

            trace!(%phase, "not reached, probing again in {:?}", self.config.poll_interval);
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    // Command failures are logged and do not fail the phase.
    async fn run_commands(&self, phase: Phase, hook: &str, commands: &[StageCommand]) {
        for command in commands {
            debug!(%phase, hook, %command, "running stage command");
            if let Err(err) = self.lifecycle.run_command(&self.name, command).await {
                warn!(%phase, hook, %command, "stage command failed: {}", err);
            }
        }
    }

    /// Bounds `work` by the phase timeout and the run's cancellation token
    async fn guarded<T>(
        &self,
        phase: Phase,
        work: impl Future<Output = Result<T, DeployError>>,
    ) -> Result<T, DeployError> {
        let bounded = async {
            match self.config.phase_timeout {
                Some(after) => tokio::time::timeout(after, work)
                    .await
                    .unwrap_or_else(|_| Err(DeployError::timeout(&self.name, phase, after))),
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DeployError::cancelled(&self.name, phase)),
            result = bounded => result,
        }
    }

    fn give_up(&self, phase: Phase, err: DeployError) -> NodeOutcome {
        if self.config.failure_policy == FailurePolicy::Unblock {
            self.scheduler.signal_failed(&self.name, phase);
            for later in phase.later() {
                self.scheduler.signal_failed(&self.name, later);
            }
        }

        if err.is_cancelled() {
            info!(%phase, "deployment cancelled");
            NodeOutcome::Cancelled { phase }
        } else {
            error!(%phase, "node failed: {}", err);
            NodeOutcome::Failed {
                phase,
                error: err.to_string(),
            }
        }
    }
}

fn is_probe(phase: Phase) -> bool {
    matches!(phase, Phase::Healthy | Phase::Exit)
}
