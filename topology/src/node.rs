// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Topology tree nodes.

use crate::device::{DeviceRecord, DeviceType, ROOT_NODE_ID};

/// The kind of a [`TopologyNode`].
///
/// On the wire the kind is the `type` field: `"root"`, `"NUMA"`, `"PCIE"`, or
/// the device type (e.g. `"gpu"`) for device leaves.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum::EnumIs)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum NodeKind {
    /// Synthetic root of a manifest.
    Root,
    /// A NUMA node; children are PCIe groups.
    Numa,
    /// A PCIe group; children are device leaves.
    Pcie,
    /// A device leaf.
    Device(DeviceType),
}

/// A `type` string which names no [`NodeKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topology node type \"{0}\"")]
pub struct InvalidNodeKind(pub String);

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::Numa => write!(f, "NUMA"),
            NodeKind::Pcie => write!(f, "PCIE"),
            NodeKind::Device(device_type) => write!(f, "{device_type}"),
        }
    }
}

impl From<NodeKind> for String {
    fn from(value: NodeKind) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for NodeKind {
    type Error = InvalidNodeKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "root" => Ok(NodeKind::Root),
            "NUMA" => Ok(NodeKind::Numa),
            "PCIE" => Ok(NodeKind::Pcie),
            other => other
                .parse::<DeviceType>()
                .map(NodeKind::Device)
                .map_err(|_| InvalidNodeKind(value)),
        }
    }
}

/// A node in a device topology tree.
///
/// A manifest is a single tree of the shape
///
/// ```text
/// root (nodeID -1)
/// └── NUMA (nodeID n)
///     └── PCIE (nodeID n, pcieID p)
///         └── device leaf (nodeID n, pcieID p, busID, type, uuid)
/// ```
///
/// Parents own their children in insertion order.  There are no back
/// references; the tree is only ever walked downwards.
///
/// # Examples
///
/// ```
/// # use devtopo_topology::TopologyNode;
/// #
/// fn count_groups(node: &TopologyNode) -> usize {
///     let own = usize::from(node.kind().is_pcie());
///     own + node.children().iter().map(count_groups).sum::<usize>()
/// }
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TopologyNode {
    #[cfg_attr(any(test, feature = "serde"), serde(rename = "nodeID"))]
    node_id: i32,
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(rename = "pcieID", default, skip_serializing_if = "String::is_empty")
    )]
    pcie_id: String,
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(rename = "busID", default, skip_serializing_if = "String::is_empty")
    )]
    bus_id: String,
    #[cfg_attr(any(test, feature = "serde"), serde(rename = "type"))]
    kind: NodeKind,
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(default, skip_serializing_if = "String::is_empty")
    )]
    uuid: String,
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(default, skip_serializing_if = "Vec::is_empty")
    )]
    children: Vec<TopologyNode>,
}

impl TopologyNode {
    fn new(node_id: i32, pcie_id: String, kind: NodeKind) -> Self {
        Self {
            node_id,
            pcie_id,
            bus_id: String::new(),
            kind,
            uuid: String::new(),
            children: Vec::new(),
        }
    }

    /// Creates an empty synthetic root.
    #[must_use]
    pub fn root() -> Self {
        Self::new(ROOT_NODE_ID, String::new(), NodeKind::Root)
    }

    /// Creates an empty NUMA node.
    #[must_use]
    pub fn numa(node_id: i32) -> Self {
        Self::new(node_id, String::new(), NodeKind::Numa)
    }

    /// Creates an empty PCIe group under NUMA node `node_id`.
    #[must_use]
    pub fn pcie(node_id: i32, pcie_id: impl Into<String>) -> Self {
        Self::new(node_id, pcie_id.into(), NodeKind::Pcie)
    }

    /// Creates a device leaf carrying every field of `device`.
    #[must_use]
    pub fn leaf(device: &DeviceRecord) -> Self {
        Self {
            node_id: device.node_id(),
            pcie_id: device.pcie_id().to_owned(),
            bus_id: device.bus_id().to_owned(),
            kind: NodeKind::Device(device.device_type()),
            uuid: device.uuid().to_owned(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    /// PCIe group id.  Empty for root and NUMA nodes (and for ungrouped devices).
    #[must_use]
    pub fn pcie_id(&self) -> &str {
        &self.pcie_id
    }

    /// Bus address.  Only device leaves carry one.
    #[must_use]
    pub fn bus_id(&self) -> &str {
        &self.bus_id
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Device id.  Only device leaves carry one.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    #[must_use]
    pub fn children(&self) -> &[TopologyNode] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<TopologyNode> {
        &mut self.children
    }

    /// Iterates over the device leaves below (or at) this node, depth first, in
    /// insertion order.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        write!(f, "{:width$}{}", "", self.kind, width = depth * 2)?;
        match self.kind {
            NodeKind::Root => {}
            NodeKind::Numa => write!(f, " {}", self.node_id)?,
            NodeKind::Pcie => write!(f, " {:?}", self.pcie_id)?,
            NodeKind::Device(_) => write!(f, " {:?} {}", self.bus_id, self.uuid)?,
        }
        writeln!(f)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for TopologyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Depth-first iterator over device leaves, see [`TopologyNode::leaves`].
pub struct Leaves<'a> {
    stack: Vec<&'a TopologyNode>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a TopologyNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            if node.kind.is_device() {
                return Some(node);
            }
            self.stack.extend(node.children.iter().rev());
        }
        None
    }
}
