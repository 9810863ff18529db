//! Deployment driver
//!
//! Runs one task per node against a frozen
//! [`DependencyScheduler`](crate::graph::DependencyScheduler) and a
//! [`NodeLifecycle`] implementation. The scheduler only orders phases; this
//! module adds what it leaves out:
//!
//! - an admission limit on concurrent node work
//! - per-phase timeouts and cancellation
//! - the [`FailurePolicy`] applied when a phase fails

mod config;
mod deployment;
mod error;
mod lifecycle;
mod report;

pub use config::{DeployConfig, FailurePolicy};
pub use deployment::Deployment;
pub use error::{DeployError, LifecycleError};
pub use lifecycle::NodeLifecycle;
pub use report::{DeploymentReport, NodeOutcome};
