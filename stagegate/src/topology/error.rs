use crate::graph::DependencyError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a topology or deriving its dependency graph.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopologyError {
    /// The topology file could not be read.
    #[error("failed to read topology file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is neither YAML nor JSON.
    #[error("unsupported topology file format: {path} (expected .yml, .yaml or .json)")]
    UnsupportedFormat { path: PathBuf },

    /// The YAML document is malformed.
    #[error("invalid topology YAML")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON document is malformed.
    #[error("invalid topology JSON")]
    Json(#[from] serde_json::Error),

    /// A node was looked up that the topology does not define.
    #[error("node {name:?} is not defined in the topology")]
    NodeNotFound { name: String },

    /// Building the dependency graph failed.
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

pub type Result<T> = std::result::Result<T, TopologyError>;
