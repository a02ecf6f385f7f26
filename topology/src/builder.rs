// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Grouping of flat device records into topology trees.

use std::collections::BTreeMap;

use crate::device::DeviceRecord;
use crate::node::TopologyNode;

#[allow(unused)]
use tracing::{debug, trace};

/// Groups `devices` into one NUMA-rooted subtree per distinct NUMA node id.
///
/// Within a NUMA node, PCIe groups appear in the order their first device was
/// seen, and each group's leaves appear in input order.  An empty `pcie_id` is
/// an ordinary group key.  An empty input yields an empty map.
///
/// Finding the group of a device is a linear scan over the groups of its NUMA
/// node; nodes carry tens of devices, not millions.
///
/// # Examples
///
/// ```
/// use devtopo_topology::{DeviceRecord, DeviceType, build_tree};
///
/// let devices = [
///     DeviceRecord::new(0, "p0", "0000:01:00.0", DeviceType::Gpu, "gpu-0").unwrap(),
///     DeviceRecord::new(0, "p0", "0000:02:00.0", DeviceType::Rdma, "rdma-0").unwrap(),
///     DeviceRecord::new(1, "p1", "0000:81:00.0", DeviceType::Gpu, "gpu-1").unwrap(),
/// ];
/// let tree = build_tree(&devices);
/// assert_eq!(tree.len(), 2);
/// assert_eq!(tree[&0].children().len(), 1);
/// assert_eq!(tree[&0].children()[0].children().len(), 2);
/// ```
#[must_use]
pub fn build_tree(devices: &[DeviceRecord]) -> BTreeMap<i32, TopologyNode> {
    let mut numa_nodes: BTreeMap<i32, TopologyNode> = BTreeMap::new();
    for device in devices {
        let numa = numa_nodes
            .entry(device.node_id())
            .or_insert_with(|| TopologyNode::numa(device.node_id()));
        let groups = numa.children_mut();
        let index = match groups
            .iter()
            .position(|group| group.pcie_id() == device.pcie_id())
        {
            Some(index) => index,
            None => {
                groups.push(TopologyNode::pcie(device.node_id(), device.pcie_id()));
                groups.len() - 1
            }
        };
        groups[index].children_mut().push(TopologyNode::leaf(device));
    }
    numa_nodes
}

/// Builds the complete tree of one node: a synthetic root whose children are
/// the NUMA subtrees of [`build_tree`], in ascending NUMA node id order.
#[must_use]
pub fn build_root(devices: &[DeviceRecord]) -> TopologyNode {
    let mut root = TopologyNode::root();
    root.children_mut().extend(build_tree(devices).into_values());
    debug!(
        "built topology tree: {} devices in {} NUMA nodes",
        devices.len(),
        root.children().len()
    );
    trace!("topology tree:\n{root}");
    root
}
