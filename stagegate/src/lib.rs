//! Stagegate: stage dependency scheduling for multi-node topology deployments
//!
//! Every node of a lab passes through the same lifecycle phases (create,
//! create-links, configure, healthy, exit). Nodes may declare that one of
//! their phases waits until another node finished one of its phases.
//! `stagegate` records those edges, rejects cyclic graphs before anything
//! runs, and lets one concurrent task per node block until its
//! prerequisites have signalled.
//!
//! # Quick Start
//!
//! ```
//! use stagegate::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), DependencyError> {
//! let mut manager = DependencyManager::new();
//! manager.register_node("spine1")?;
//! manager.register_node("leaf1")?;
//! manager.add_dependency("leaf1", Phase::Configure, "spine1", Phase::Healthy)?;
//!
//! let scheduler = Arc::new(manager.freeze()?);
//!
//! let leaf = {
//!     let scheduler = Arc::clone(&scheduler);
//!     tokio::spawn(async move {
//!         let admission = scheduler.enter("leaf1", Phase::Configure).await?;
//!         assert!(admission.is_clear());
//!         scheduler.signal_done("leaf1", Phase::Configure);
//!         Ok::<_, DependencyError>(())
//!     })
//! };
//!
//! scheduler.signal_done("spine1", Phase::Healthy);
//! leaf.await.unwrap()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`core`]: phases and stage configuration (hides the document format)
//! - [`graph`]: dependency manager, cycle detection and gates (hides how
//!   waiters are counted and woken)
//! - [`topology`]: lab documents and implicit dependency edges
//! - [`executor`]: the per-node deployment driver (hides timeouts,
//!   admission and failure handling)

pub mod core;
pub mod executor;
pub mod graph;
pub mod topology;

pub use core::{
    CommandTarget, CoreError, Phase, Result as CoreResult, StageCommand, StageConfig, Stages,
    WaitFor,
};

pub use executor::{
    DeployConfig, DeployError, Deployment, DeploymentReport, FailurePolicy, LifecycleError,
    NodeLifecycle, NodeOutcome,
};

pub use graph::{
    Admission, DependencyError, DependencyManager, DependencyResult, DependencyScheduler,
};

pub use topology::{LabDefinition, NodeDefinition, Topology, TopologyError};

// Re-export dependencies used in public API
pub use async_trait::async_trait; // NodeLifecycle implementations need it
pub use tokio;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient glob imports
///
/// # Example
///
/// ```
/// use stagegate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{CommandTarget, Phase, StageCommand, StageConfig, Stages, WaitFor};

    pub use crate::executor::{
        DeployConfig, DeployError, Deployment, DeploymentReport, FailurePolicy, LifecycleError,
        NodeLifecycle, NodeOutcome,
    };

    pub use crate::graph::{
        Admission, DependencyError, DependencyManager, DependencyResult, DependencyScheduler,
    };

    pub use crate::topology::{LabDefinition, Topology, TopologyError};

    pub use async_trait::async_trait;
    pub use tokio_util::sync::CancellationToken;
}
