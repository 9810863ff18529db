//! Lifecycle phases
//!
//! Every node in a topology passes through the same fixed sequence of
//! phases during a deployment. The deployment driver walks them in the
//! order of [`Phase::ALL`]; the scheduler itself treats them as plain keys,
//! only declared wait-for edges order one node's phase against another's.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named lifecycle phase of a node.
///
/// # Examples
///
/// ```
/// use stagegate::core::Phase;
///
/// let phase: Phase = "create-links".parse().unwrap();
/// assert_eq!(phase, Phase::CreateLinks);
/// assert_eq!(phase.to_string(), "create-links");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// The node's container is being created and started.
    Create,
    /// The node's link endpoints are being wired.
    CreateLinks,
    /// Post-deploy configuration of the node.
    Configure,
    /// The node reports itself as healthy.
    Healthy,
    /// The node's container has stopped.
    Exit,
}

impl Phase {
    /// Number of phases.
    pub const COUNT: usize = 5;

    /// All phases in deployment order.
    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::Create,
        Phase::CreateLinks,
        Phase::Configure,
        Phase::Healthy,
        Phase::Exit,
    ];

    /// Returns the canonical string form of the phase
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Create => "create",
            Phase::CreateLinks => "create-links",
            Phase::Configure => "configure",
            Phase::Healthy => "healthy",
            Phase::Exit => "exit",
        }
    }

    /// Position of the phase inside [`Phase::ALL`]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Phases that come after this one, in deployment order.
    pub fn later(self) -> impl Iterator<Item = Phase> {
        Phase::ALL.into_iter().skip(self.index() + 1)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| Error::unknown_phase(s))
    }
}
