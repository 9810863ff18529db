//! Core types shared by every layer of the stage scheduler.
//!
//! # Domain Model
//! - [`Phase`]: The closed set of lifecycle phases a node passes through
//! - [`WaitFor`]: A declared "wait for node X to finish phase Y" edge
//! - [`StageCommand`]: A command run when a node enters or leaves a phase
//! - [`StageConfig`] / [`Stages`]: Per-phase configuration of a node, with the
//!   append-and-deduplicate merge used for layered inheritance
//!
//! # Error Handling
//! - [`CoreError`]: Errors produced while interpreting phase names
//!
//! # Example
//!
//! ```
//! use stagegate::core::{Phase, Stages, WaitFor};
//!
//! let mut defaults = Stages::new();
//! defaults.push_wait_for(Phase::Configure, WaitFor::new("spine1", Phase::Healthy));
//!
//! let mut node = Stages::new();
//! node.push_wait_for(Phase::Configure, WaitFor::new("spine1", Phase::Healthy));
//! node.push_wait_for(Phase::Configure, WaitFor::new("spine2", Phase::Healthy));
//!
//! let resolved = Stages::layered([&defaults, &node]);
//! assert_eq!(resolved.get(Phase::Configure).wait_for.len(), 2);
//! ```

mod error;
mod phase;
mod stages;

pub use error::{Error as CoreError, Result};
pub use phase::Phase;
pub use stages::{CommandTarget, StageCommand, StageConfig, Stages, WaitFor};
