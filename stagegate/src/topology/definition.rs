//! Topology documents
//!
//! Only the part of a lab topology that matters for stage scheduling is
//! modelled here: node kinds and groups (for stage inheritance), the network
//! mode (for namespace sharing) and static management addresses. Every other
//! key of a node definition is accepted and ignored.

use super::error::{Result, TopologyError};
use crate::core::Stages;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Settings that can appear on the defaults, kind, group or node level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NodeDefinition {
    /// Node kind; selects the kind layer of inherited settings
    pub kind: Option<String>,
    /// Group name; selects the group layer of inherited settings
    pub group: Option<String>,
    /// Container network mode, e.g. `bridge` or `container:<peer>`
    pub network_mode: Option<String>,
    /// Static IPv4 management address
    pub mgmt_ipv4: Option<String>,
    /// Static IPv6 management address
    pub mgmt_ipv6: Option<String>,
    /// Stage settings declared on this level
    pub stages: Option<Stages>,
}

/// A complete lab file: a name plus its topology
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabDefinition {
    pub name: String,
    #[serde(default)]
    pub topology: Topology,
}

impl LabDefinition {
    /// Loads a lab file, picking the parser from the file extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let lab = match extension.as_deref() {
            Some("yml" | "yaml") => Self::from_yaml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => {
                return Err(TopologyError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        debug!(
            "loaded lab {:?} with {} nodes from {}",
            lab.name,
            lab.topology.nodes.len(),
            path.display()
        );
        Ok(lab)
    }

    /// Parses a lab from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parses a lab from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Node definitions together with the layers they inherit from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub defaults: NodeDefinition,
    pub kinds: BTreeMap<String, NodeDefinition>,
    pub groups: BTreeMap<String, NodeDefinition>,
    pub nodes: BTreeMap<String, NodeDefinition>,
}

impl Topology {
    /// Returns the definition of a node
    pub fn node(&self, name: &str) -> Result<&NodeDefinition> {
        self.nodes
            .get(name)
            .ok_or_else(|| TopologyError::NodeNotFound {
                name: name.to_string(),
            })
    }

    /// Node names in sorted order
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Kind of a node, falling back to the default kind
    pub fn node_kind(&self, name: &str) -> Result<Option<&str>> {
        let node = self.node(name)?;
        Ok(node.kind.as_deref().or(self.defaults.kind.as_deref()))
    }

    /// Group of a node, falling back to the default group
    pub fn node_group(&self, name: &str) -> Result<Option<&str>> {
        let node = self.node(name)?;
        Ok(node.group.as_deref().or(self.defaults.group.as_deref()))
    }

    /// Network mode of a node: node level first, then kind, then defaults
    pub fn node_network_mode(&self, name: &str) -> Result<Option<&str>> {
        let node = self.node(name)?;
        let kind = self.kind_definition(name)?;

        Ok(node
            .network_mode
            .as_deref()
            .or_else(|| kind.and_then(|k| k.network_mode.as_deref()))
            .or(self.defaults.network_mode.as_deref())
            .filter(|mode| !mode.is_empty()))
    }

    /// True if the node has a statically assigned management address
    pub fn has_static_mgmt_address(&self, name: &str) -> Result<bool> {
        let node = self.node(name)?;
        let is_set = |addr: &Option<String>| addr.as_deref().is_some_and(|a| !a.is_empty());
        Ok(is_set(&node.mgmt_ipv4) || is_set(&node.mgmt_ipv6))
    }

    /// Resolves the stages of a node.
    ///
    /// Layers are merged defaults first, then kind, group and node, each
    /// one appending to what it inherits.
    pub fn stages(&self, name: &str) -> Result<Stages> {
        let node = self.node(name)?;
        let kind = self.kind_definition(name)?;
        let group = self
            .node_group(name)?
            .and_then(|group| self.groups.get(group));

        let layers = [Some(&self.defaults), kind, group, Some(node)];
        Ok(Stages::layered(
            layers
                .into_iter()
                .flatten()
                .filter_map(|definition| definition.stages.as_ref()),
        ))
    }

    /// Resolved stages of every node
    pub fn stages_by_node(&self) -> Result<BTreeMap<String, Stages>> {
        self.node_names()
            .map(|name| Ok((name.to_string(), self.stages(name)?)))
            .collect()
    }

    fn kind_definition(&self, name: &str) -> Result<Option<&NodeDefinition>> {
        Ok(self.node_kind(name)?.and_then(|kind| self.kinds.get(kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Phase, StageCommand, WaitFor};
    use std::io::Write;

    const LAB: &str = r#"
name: clos
topology:
  defaults:
    stages:
      create:
        wait-for:
          - node: mgmt
  kinds:
    srl:
      network-mode: bridge
      stages:
        configure:
          wait-for:
            - node: mgmt
              stage: healthy
          on-enter:
            - "sr_cli show version"
  groups:
    spines:
      stages:
        configure:
          on-exit:
            - command: "logger spines configured"
              target: host
  nodes:
    mgmt:
      kind: linux
      mgmt-ipv4: 172.20.20.2
    spine1:
      kind: srl
      group: spines
      image: ghcr.io/nokia/srlinux
      stages:
        configure:
          wait-for:
            - node: mgmt
              stage: healthy
            - node: spine2
              stage: create
    spine2:
      kind: srl
      group: spines
    sidecar:
      kind: linux
      network-mode: container:spine1
"#;

    fn lab() -> LabDefinition {
        LabDefinition::from_yaml_str(LAB).unwrap()
    }

    #[test]
    fn test_parse_lab() {
        let lab = lab();
        assert_eq!(lab.name, "clos");
        assert_eq!(
            lab.topology.node_names().collect::<Vec<_>>(),
            vec!["mgmt", "sidecar", "spine1", "spine2"]
        );
    }

    #[test]
    fn test_kind_group_and_network_mode_lookup() {
        let topology = lab().topology;
        assert_eq!(topology.node_kind("spine1").unwrap(), Some("srl"));
        assert_eq!(topology.node_group("spine1").unwrap(), Some("spines"));
        assert_eq!(topology.node_group("mgmt").unwrap(), None);
        assert_eq!(
            topology.node_network_mode("spine2").unwrap(),
            Some("bridge")
        );
        assert_eq!(
            topology.node_network_mode("sidecar").unwrap(),
            Some("container:spine1")
        );
        assert_eq!(topology.node_network_mode("mgmt").unwrap(), None);
    }

    #[test]
    fn test_static_mgmt_address() {
        let topology = lab().topology;
        assert!(topology.has_static_mgmt_address("mgmt").unwrap());
        assert!(!topology.has_static_mgmt_address("spine1").unwrap());
    }

    #[test]
    fn test_stages_merge_all_layers() {
        let stages = lab().topology.stages("spine1").unwrap();

        assert_eq!(stages.create.wait_for, vec![WaitFor::new("mgmt", Phase::Create)]);
        assert_eq!(
            stages.configure.wait_for,
            vec![
                WaitFor::new("mgmt", Phase::Healthy),
                WaitFor::new("spine2", Phase::Create),
            ]
        );
        assert_eq!(
            stages.configure.on_enter,
            vec![StageCommand::container("sr_cli show version")]
        );
        assert_eq!(
            stages.configure.on_exit,
            vec![StageCommand::host("logger spines configured")]
        );
    }

    #[test]
    fn test_stages_of_unknown_node() {
        let err = lab().topology.stages("ghost").unwrap_err();
        assert!(matches!(err, TopologyError::NodeNotFound { name } if name == "ghost"));
    }

    #[test]
    fn test_from_path_picks_parser_by_extension() {
        let lab = lab();

        let mut yaml = tempfile::Builder::new().suffix(".clab.yml").tempfile().unwrap();
        yaml.write_all(LAB.as_bytes()).unwrap();
        assert_eq!(LabDefinition::from_path(yaml.path()).unwrap(), lab);

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        json.write_all(serde_json::to_string(&lab).unwrap().as_bytes())
            .unwrap();
        assert_eq!(LabDefinition::from_path(json.path()).unwrap(), lab);

        let txt = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            LabDefinition::from_path(txt.path()),
            Err(TopologyError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(matches!(
            LabDefinition::from_path("/nonexistent/lab.yml"),
            Err(TopologyError::Io { .. })
        ));
    }
}
