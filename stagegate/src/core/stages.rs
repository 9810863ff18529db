//! Stage configuration model
//!
//! A node's [`Stages`] describe, for each [`Phase`], which other nodes it has
//! to wait for and which commands run when the phase is entered or left.
//!
//! # Merge Strategy
//!
//! Topology files declare stages on four layers: defaults, kind, group and
//! node. Layers are merged from the least to the most specific one by
//! *appending* rather than overriding, skipping entries that are already
//! present. A more specific layer can therefore only add dependencies and
//! commands, never drop inherited ones.

use super::phase::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dependency on another node reaching a phase.
///
/// Attached to a node's stage it reads as "this stage may not start until
/// `node` has completed `stage`". Two edges are equal when both the node and
/// the stage match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitFor {
    /// The node to wait for
    pub node: String,
    /// The phase that node must have completed
    #[serde(default = "default_wait_for_stage", alias = "state")]
    pub stage: Phase,
}

fn default_wait_for_stage() -> Phase {
    Phase::Create
}

impl WaitFor {
    /// Creates an edge waiting for `stage` of `node`
    pub fn new(node: impl Into<String>, stage: Phase) -> Self {
        Self {
            node: node.into(),
            stage,
        }
    }
}

impl fmt::Display for WaitFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node, self.stage)
    }
}

/// Where a stage command is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandTarget {
    /// Inside the node's container.
    #[default]
    Container,
    /// On the host running the deployment.
    Host,
}

/// A command bound to entering or leaving a stage.
///
/// In a topology file a command is either a bare string, which runs in the
/// node's container, or a map with `command` and `target` keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "StageCommandRepr")]
pub struct StageCommand {
    /// The command line, passed to the runtime unchanged
    pub command: String,
    /// Where the command runs
    pub target: CommandTarget,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StageCommandRepr {
    Bare(String),
    Full {
        command: String,
        #[serde(default)]
        target: CommandTarget,
    },
}

impl From<StageCommandRepr> for StageCommand {
    fn from(repr: StageCommandRepr) -> Self {
        match repr {
            StageCommandRepr::Bare(command) => Self::container(command),
            StageCommandRepr::Full { command, target } => Self { command, target },
        }
    }
}

impl StageCommand {
    /// Command executed inside the node's container
    pub fn container(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            target: CommandTarget::Container,
        }
    }

    /// Command executed on the deployment host
    pub fn host(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            target: CommandTarget::Host,
        }
    }
}

impl fmt::Display for StageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            CommandTarget::Container => write!(f, "{}", self.command),
            CommandTarget::Host => write!(f, "host: {}", self.command),
        }
    }
}

/// Configuration of a single stage of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StageConfig {
    /// Edges that must be satisfied before the stage starts
    pub wait_for: Vec<WaitFor>,
    /// Commands run right after the stage is entered
    pub on_enter: Vec<StageCommand>,
    /// Commands run right before the stage is signalled as done
    pub on_exit: Vec<StageCommand>,
}

impl StageConfig {
    /// Appends the entries of `other` that are not present yet.
    pub fn merge(&mut self, other: &StageConfig) {
        append_unique(&mut self.wait_for, &other.wait_for);
        append_unique(&mut self.on_enter, &other.on_enter);
        append_unique(&mut self.on_exit, &other.on_exit);
    }

    /// Returns true if the stage carries on-enter or on-exit commands
    pub fn has_commands(&self) -> bool {
        !self.on_enter.is_empty() || !self.on_exit.is_empty()
    }
}

fn append_unique<T: PartialEq + Clone>(into: &mut Vec<T>, from: &[T]) {
    for entry in from {
        if !into.contains(entry) {
            into.push(entry.clone());
        }
    }
}

/// The stages of one node, one [`StageConfig`] per [`Phase`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Stages {
    pub create: StageConfig,
    pub create_links: StageConfig,
    pub configure: StageConfig,
    pub healthy: StageConfig,
    pub exit: StageConfig,
}

impl Stages {
    /// Creates empty stages
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges layers from the least to the most specific one.
    ///
    /// Resolution never fails and has no side effects; a missing layer is
    /// simply not part of the iterator.
    pub fn layered<'a>(layers: impl IntoIterator<Item = &'a Stages>) -> Self {
        let mut resolved = Self::new();
        for layer in layers {
            resolved.merge(layer);
        }
        resolved
    }

    /// Returns the configuration of a phase
    pub fn get(&self, phase: Phase) -> &StageConfig {
        match phase {
            Phase::Create => &self.create,
            Phase::CreateLinks => &self.create_links,
            Phase::Configure => &self.configure,
            Phase::Healthy => &self.healthy,
            Phase::Exit => &self.exit,
        }
    }

    /// Returns the mutable configuration of a phase
    pub fn get_mut(&mut self, phase: Phase) -> &mut StageConfig {
        match phase {
            Phase::Create => &mut self.create,
            Phase::CreateLinks => &mut self.create_links,
            Phase::Configure => &mut self.configure,
            Phase::Healthy => &mut self.healthy,
            Phase::Exit => &mut self.exit,
        }
    }

    /// Merges `other` into `self`, phase by phase.
    pub fn merge(&mut self, other: &Stages) {
        for phase in Phase::ALL {
            self.get_mut(phase).merge(other.get(phase));
        }
    }

    /// Adds a wait-for edge to a phase unless an equal one exists
    pub fn push_wait_for(&mut self, phase: Phase, wait_for: WaitFor) -> &mut Self {
        append_unique(&mut self.get_mut(phase).wait_for, &[wait_for]);
        self
    }

    /// Adds an on-enter command to a phase unless an equal one exists
    pub fn push_on_enter(&mut self, phase: Phase, command: StageCommand) -> &mut Self {
        append_unique(&mut self.get_mut(phase).on_enter, &[command]);
        self
    }

    /// Adds an on-exit command to a phase unless an equal one exists
    pub fn push_on_exit(&mut self, phase: Phase, command: StageCommand) -> &mut Self {
        append_unique(&mut self.get_mut(phase).on_exit, &[command]);
        self
    }

    /// Iterates the wait-for lists of all phases in deployment order
    pub fn wait_for(&self) -> impl Iterator<Item = (Phase, &[WaitFor])> + '_ {
        Phase::ALL
            .into_iter()
            .map(move |phase| (phase, self.get(phase).wait_for.as_slice()))
    }

    /// Returns true if the phase carries on-enter or on-exit commands
    pub fn has_commands(&self, phase: Phase) -> bool {
        self.get(phase).has_commands()
    }
}
