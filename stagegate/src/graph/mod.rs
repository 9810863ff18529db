//! Stage dependency graph
//!
//! This module provides the data structures and algorithms that let one
//! node's phase wait for another node's phase:
//!
//! - Registration of nodes and per-phase wait-for edges
//! - Cycle detection before any node starts executing
//! - Blocking `enter` / non-blocking `signal_done` synchronization for the
//!   per-node deployment tasks
//!
//! # Design Principles
//!
//! The module hides how gates count and wake waiters. Callers only see the
//! two-step API: build with [`DependencyManager`], then run with the
//! [`DependencyScheduler`] returned by [`DependencyManager::freeze`].
//!
//! # Algorithm References
//!
//! Cycle detection is an iterative leaf-pruning variant of Kahn's
//! algorithm, see [`acyclic`].

pub mod acyclic;
mod error;
mod gate;
mod manager;
mod node;

pub use acyclic::{cyclic_region, is_acyclic};
pub use error::{DependencyError, DependencyResult};
pub use manager::{Admission, DependencyManager, DependencyScheduler};
