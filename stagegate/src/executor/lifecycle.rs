use super::error::LifecycleError;
use crate::core::StageCommand;
use async_trait::async_trait;

/// The runtime operations a deployment drives for each node.
///
/// Implementations talk to the container runtime; the driver only decides
/// when each call happens. All methods receive the node name as registered
/// in the topology.
#[async_trait]
pub trait NodeLifecycle: Send + Sync + 'static {
    /// Creates and starts the node's container.
    async fn create(&self, node: &str) -> Result<(), LifecycleError>;

    /// Wires the node's link endpoints.
    async fn create_links(&self, node: &str) -> Result<(), LifecycleError>;

    /// Runs post-deploy configuration.
    async fn configure(&self, node: &str) -> Result<(), LifecycleError>;

    /// Probes whether the node reports itself healthy.
    async fn is_healthy(&self, node: &str) -> Result<bool, LifecycleError>;

    /// Probes whether the node's container has stopped.
    async fn is_exited(&self, node: &str) -> Result<bool, LifecycleError>;

    /// Probes whether a container outside the topology is running.
    ///
    /// Called before creating a node that shares the network namespace of
    /// such a container.
    async fn is_running(&self, container: &str) -> Result<bool, LifecycleError>;

    /// Executes an on-enter or on-exit stage command, either inside the
    /// node's container or on the host.
    async fn run_command(&self, node: &str, command: &StageCommand) -> Result<(), LifecycleError>;
}
