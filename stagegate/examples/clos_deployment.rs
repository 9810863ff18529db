//! Clos Fabric Deployment
//!
//! This example demonstrates:
//! - Loading a lab topology with defaults, kinds and groups
//! - Implicit dependencies (static management address, shared namespace)
//! - Running a deployment against a simulated container runtime
//! - A failing node unblocking its dependers in degraded mode
//!
//! ## Scenario
//! Two spines, two leaves that configure only after both spines are healthy,
//! a management node with a static address and a client sharing leaf1's
//! network namespace. Spine health checks and container creation take a
//! random amount of time; spine2 fails its configuration on purpose.
//!
//! ## Run with
//! ```bash
//! cargo run --example clos_deployment
//! RUST_LOG=stagegate=debug cargo run --example clos_deployment
//! ```

use rand::Rng;
use stagegate::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct SimulatedRuntime;

impl SimulatedRuntime {
    async fn busy(&self, node: &str, what: &str) {
        let millis = rand::thread_rng().gen_range(20..120);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        info!("{} {} done after {}ms", node, what, millis);
    }
}

#[async_trait]
impl NodeLifecycle for SimulatedRuntime {
    async fn create(&self, node: &str) -> Result<(), LifecycleError> {
        self.busy(node, "create").await;
        Ok(())
    }

    async fn create_links(&self, node: &str) -> Result<(), LifecycleError> {
        self.busy(node, "create-links").await;
        Ok(())
    }

    async fn configure(&self, node: &str) -> Result<(), LifecycleError> {
        self.busy(node, "configure").await;
        if node == "spine2" {
            return Err("startup config rejected".into());
        }
        Ok(())
    }

    async fn is_healthy(&self, _node: &str) -> Result<bool, LifecycleError> {
        Ok(rand::thread_rng().gen_bool(0.3))
    }

    async fn is_exited(&self, _node: &str) -> Result<bool, LifecycleError> {
        Ok(true)
    }

    async fn is_running(&self, _container: &str) -> Result<bool, LifecycleError> {
        Ok(true)
    }

    async fn run_command(&self, node: &str, command: &StageCommand) -> Result<(), LifecycleError> {
        info!("{} runs {}", node, command);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/examples/clos.clab.yml");
    let lab = LabDefinition::from_path(path)?;

    let manager = lab.topology.build_manager()?;
    println!("\n=== Dependencies of lab {} ===\n{}\n", lab.name, manager);

    let deployment = Deployment::new(
        manager.freeze()?,
        lab.topology.stages_by_node()?,
        Arc::new(SimulatedRuntime),
        DeployConfig::default()
            .with_max_concurrency(3)
            .with_poll_interval(Duration::from_millis(50))
            .with_phase_timeout(Duration::from_secs(30)),
    )
    .with_external_peers(lab.topology.external_peers()?);

    let report = deployment.run(CancellationToken::new()).await;

    println!("\n=== Run {} ({}ms) ===", report.run_id, report.elapsed().num_milliseconds());
    for (node, outcome) in &report.nodes {
        println!("{:<8} {:?}", node, outcome);
    }

    Ok(())
}
