//! Topology model
//!
//! Loads the stage-relevant part of a lab file and turns it into a
//! [`DependencyManager`](crate::graph::DependencyManager):
//!
//! - [`LabDefinition`]: a lab file (YAML or JSON)
//! - [`Topology`]: defaults, kinds, groups and nodes, with stage resolution
//!   per node
//! - [`Topology::build_manager`]: declared and implicit dependency edges

mod definition;
mod dependencies;
mod error;

pub use definition::{LabDefinition, NodeDefinition, Topology};
pub use error::{Result, TopologyError};
