use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stagegate::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stagegate")]
#[command(about = "Inspect stage dependencies of a lab topology", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dependency graph, check it for cycles and print it
    Check {
        /// Path to the topology file (.yml, .yaml or .json)
        topology: PathBuf,
    },

    /// Render the dependency graph in Graphviz DOT format
    Dot {
        /// Path to the topology file (.yml, .yaml or .json)
        topology: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Walk every node through its phases without touching a runtime and
    /// print the order in which phases completed
    Simulate {
        /// Path to the topology file (.yml, .yaml or .json)
        topology: PathBuf,

        /// Maximum number of nodes working at the same time
        #[arg(short = 'p', long)]
        max_concurrency: Option<usize>,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<LabDefinition> {
    LabDefinition::from_path(path).with_context(|| format!("loading {}", path.display()))
}

fn check(path: &Path) -> Result<()> {
    let lab = load(path)?;
    let manager = lab.topology.build_manager()?;
    manager.check_acyclicity()?;

    info!("lab {} has {} nodes and no dependency cycles", lab.name, manager.len());
    println!("{manager}");
    Ok(())
}

fn dot(path: &Path, output: Option<&Path>) -> Result<()> {
    let lab = load(path)?;
    let rendered = lab.topology.build_manager()?.to_dot();

    match output {
        Some(output) => std::fs::write(output, rendered)
            .with_context(|| format!("writing {}", output.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Lifecycle that only records which phase finished when
#[derive(Default)]
struct DryRun {
    completed: Mutex<Vec<String>>,
}

impl DryRun {
    fn record(&self, node: &str, what: &str) {
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(format!("{node} {what}"));
        }
    }
}

#[async_trait]
impl NodeLifecycle for DryRun {
    async fn create(&self, node: &str) -> Result<(), LifecycleError> {
        self.record(node, "create");
        Ok(())
    }

    async fn create_links(&self, node: &str) -> Result<(), LifecycleError> {
        self.record(node, "create-links");
        Ok(())
    }

    async fn configure(&self, node: &str) -> Result<(), LifecycleError> {
        self.record(node, "configure");
        Ok(())
    }

    async fn is_healthy(&self, node: &str) -> Result<bool, LifecycleError> {
        self.record(node, "healthy");
        Ok(true)
    }

    async fn is_exited(&self, node: &str) -> Result<bool, LifecycleError> {
        self.record(node, "exit");
        Ok(true)
    }

    async fn is_running(&self, container: &str) -> Result<bool, LifecycleError> {
        self.record(container, "running (external)");
        Ok(true)
    }

    async fn run_command(&self, node: &str, command: &StageCommand) -> Result<(), LifecycleError> {
        self.record(node, &format!("run {command}"));
        Ok(())
    }
}

async fn simulate(path: &Path, max_concurrency: Option<usize>) -> Result<()> {
    let lab = load(path)?;
    let scheduler = lab.topology.build_manager()?.freeze()?;

    let mut config = DeployConfig::default();
    config.max_concurrency = max_concurrency;

    let lifecycle = Arc::new(DryRun::default());
    let deployment = Deployment::new(
        scheduler,
        lab.topology.stages_by_node()?,
        Arc::clone(&lifecycle),
        config,
    )
    .with_external_peers(lab.topology.external_peers()?);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = deployment.run(cancel).await;

    let completed = lifecycle
        .completed
        .lock()
        .map(|completed| completed.clone())
        .unwrap_or_default();
    for (step, entry) in completed.iter().enumerate() {
        println!("{:>4}  {}", step + 1, entry);
    }

    if !report.is_success() {
        let unfinished: Vec<_> = report.unfinished().collect();
        anyhow::bail!("nodes did not finish: {}", unfinished.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Check { topology } => check(&topology),
        Commands::Dot { topology, output } => dot(&topology, output.as_deref()),
        Commands::Simulate {
            topology,
            max_concurrency,
        } => simulate(&topology, max_concurrency).await,
    }
}
