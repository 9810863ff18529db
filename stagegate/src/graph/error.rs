//! Error types for dependency graph operations
//!
//! Construction errors (unknown nodes, duplicate registration, cycles) are
//! configuration problems: they surface synchronously from the construction
//! API and must abort the run before any node task starts.

use thiserror::Error;

/// Result type for dependency graph operations
pub type DependencyResult<T> = Result<T, DependencyError>;

/// Errors that can occur while building or using the dependency graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DependencyError {
    /// A node was registered twice
    #[error("node {name:?} is already registered with the dependency manager")]
    DuplicateNode {
        /// The duplicate node name
        name: String,
    },

    /// One or more referenced nodes are unknown
    #[error("dependency manager has no notion of the following nodes: {}", .names.join(", "))]
    NodesNotFound {
        /// Every unknown name of the offending call, in call order
        names: Vec<String>,
    },

    /// The dependency graph contains a cycle
    #[error("cyclic dependencies found between nodes [{}]\n{adjacency}", .region.join(", "))]
    CyclicDependencies {
        /// Nodes left over once every acyclic part was pruned
        region: Vec<String>,
        /// Full adjacency listing of the graph
        adjacency: String,
    },
}

impl DependencyError {
    /// Creates a duplicate node error
    pub fn duplicate_node(name: impl Into<String>) -> Self {
        Self::DuplicateNode { name: name.into() }
    }

    /// Creates a nodes not found error
    pub fn nodes_not_found<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::NodesNotFound {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a cyclic dependencies error
    pub fn cyclic(region: Vec<String>, adjacency: impl Into<String>) -> Self {
        Self::CyclicDependencies {
            region,
            adjacency: adjacency.into(),
        }
    }
}
