use thiserror::Error;

/// Core error type for phase and stage handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A phase name did not match any known lifecycle phase.
    #[error("unknown phase {name:?}, expected one of: create, create-links, configure, healthy, exit")]
    UnknownPhase { name: String },
}

impl Error {
    /// Creates an unknown phase error
    pub fn unknown_phase(name: impl Into<String>) -> Self {
        Self::UnknownPhase { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
