// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-node device inventories and their flattening into [`DeviceRecord`]s.
//!
//! An inventory maps node names to the devices found on that node, keyed by
//! device type and then by device id:
//!
//! ```yaml
//! worker-1:
//!   gpu:
//!     "0":
//!       uuid: GPU-6a5c7f1e
//!       minor: 0
//!       topology: { socketID: 0, nodeID: 0, pcieID: pci0000:3a, busID: "0000:3b:00.0" }
//!   rdma:
//!     "0":
//!       uuid: 0000:3c:00.0
//!       topology: { nodeID: 0, pcieID: pci0000:3a, busID: "0000:3c:00.0" }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use topology::{DeviceRecord, DeviceType, InvalidDeviceRecord};

#[allow(unused)]
use tracing::{debug, warn};

/// Every node's inventory, keyed (and therefore iterated) by node name.
pub type Inventory = BTreeMap<String, NodeDeviceInventory>;

/// Where a device sits in the node.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeviceTopology {
    #[serde(rename = "socketID", default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<i32>,
    #[serde(rename = "nodeID")]
    pub node_id: i32,
    #[serde(rename = "pcieID", default)]
    pub pcie_id: String,
    #[serde(rename = "busID", default)]
    pub bus_id: String,
}

/// What the device accounting component knows about one device.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<i32>,
    pub topology: DeviceTopology,
}

/// A device which was left out of a node's manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectedDevice {
    #[error("{device_type} device {device_id}: {source}")]
    Invalid {
        device_type: DeviceType,
        device_id: String,
        source: InvalidDeviceRecord,
    },
    #[error("{device_type} device {device_id} repeats uuid {uuid}")]
    DuplicateUuid {
        device_type: DeviceType,
        device_id: String,
        uuid: String,
    },
}

/// The result of [`NodeDeviceInventory::flatten`].
#[derive(Debug, Default)]
pub struct Flattened {
    /// The records to build the node's tree from.
    pub records: Vec<DeviceRecord>,
    /// Devices which could not be turned into records.
    pub rejected: Vec<RejectedDevice>,
}

/// The devices of a single node: device type → device id → device info.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeDeviceInventory {
    devices: BTreeMap<DeviceType, BTreeMap<String, DeviceInfo>>,
}

impl NodeDeviceInventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) device `device_id` of type `device_type`.
    pub fn insert(
        &mut self,
        device_type: DeviceType,
        device_id: impl Into<String>,
        info: DeviceInfo,
    ) {
        self.devices
            .entry(device_type)
            .or_default()
            .insert(device_id.into(), info);
    }

    /// Total number of devices of all types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over `(type, id, info)` in flattening order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceType, &str, &DeviceInfo)> {
        self.devices.iter().flat_map(|(device_type, devices)| {
            devices
                .iter()
                .map(|(device_id, info)| (*device_type, device_id.as_str(), info))
        })
    }

    /// Flattens the inventory into device records.
    ///
    /// Records come out ordered by device type, then by device id (compared as
    /// strings), so the same inventory always yields the same manifest.
    /// Devices with a negative NUMA node id, and devices repeating a uuid already
    /// seen on this node, are rejected.
    #[must_use]
    pub fn flatten(&self) -> Flattened {
        let mut flattened = Flattened::default();
        let mut seen = BTreeSet::new();
        for (device_type, device_id, info) in self.iter() {
            let record = match DeviceRecord::new(
                info.topology.node_id,
                info.topology.pcie_id.as_str(),
                info.topology.bus_id.as_str(),
                device_type,
                info.uuid.as_str(),
            ) {
                Ok(record) => record,
                Err(source) => {
                    flattened.rejected.push(RejectedDevice::Invalid {
                        device_type,
                        device_id: device_id.to_owned(),
                        source,
                    });
                    continue;
                }
            };
            // only valid devices claim their uuid
            if !info.uuid.is_empty() && !seen.insert(info.uuid.as_str()) {
                flattened.rejected.push(RejectedDevice::DuplicateUuid {
                    device_type,
                    device_id: device_id.to_owned(),
                    uuid: info.uuid.clone(),
                });
                continue;
            }
            flattened.records.push(record);
        }
        flattened
    }
}

/// Errors which may occur when loading an inventory file.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("failed to read inventory file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to deserialize inventory from YAML file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },
    #[error("failed to deserialize inventory from JSON file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unsupported inventory file extension \"{0}\": expected json, yaml or yml")]
    UnsupportedExtension(String),
    #[error("inventory file {} has no extension", .0.display())]
    MissingExtension(PathBuf),
}

fn read_inventory(path: &Path) -> Result<String, InventoryError> {
    fs::read_to_string(path).map_err(|source| InventoryError::Read {
        path: path.to_owned(),
        source,
    })
}

/// Read the file at `path` and deserialize it into an [`Inventory`].
/// YAML or JSON is chosen from the file extension.
///
/// # Errors
///
/// Fails if the extension is missing or unsupported, if the file cannot be
/// read, or if its contents cannot be deserialized.
pub fn load_inventory_from_file(path: impl AsRef<Path>) -> Result<Inventory, InventoryError> {
    let path = path.as_ref();
    let inventory = match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml_ng::from_str(&read_inventory(path)?).map_err(|source| {
                InventoryError::Yaml {
                    path: path.to_owned(),
                    source,
                }
            })?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&read_inventory(path)?).map_err(|source| InventoryError::Json {
                path: path.to_owned(),
                source,
            })?
        }
        Some(ext) => {
            return Err(InventoryError::UnsupportedExtension(
                ext.to_string_lossy().into_owned(),
            ));
        }
        None => return Err(InventoryError::MissingExtension(path.to_owned())),
    };
    debug!("loaded inventory from {}", path.display());
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScratchDir;
    use pretty_assertions::assert_eq;

    fn info(uuid: &str, node_id: i32, pcie_id: &str, bus_id: &str) -> DeviceInfo {
        DeviceInfo {
            uuid: uuid.to_string(),
            minor: None,
            topology: DeviceTopology {
                socket_id: None,
                node_id,
                pcie_id: pcie_id.to_string(),
                bus_id: bus_id.to_string(),
            },
        }
    }

    #[test]
    fn flatten_order_is_pinned() {
        let mut inventory = NodeDeviceInventory::new();
        inventory.insert(DeviceType::Rdma, "1", info("rdma-1", 0, "p0", "0000:02:00.1"));
        inventory.insert(DeviceType::Gpu, "1", info("gpu-1", 1, "p1", "0000:81:00.0"));
        inventory.insert(DeviceType::Rdma, "0", info("rdma-0", 0, "p0", "0000:02:00.0"));
        inventory.insert(DeviceType::Gpu, "0", info("gpu-0", 0, "p0", "0000:01:00.0"));

        let flattened = inventory.flatten();
        assert!(flattened.rejected.is_empty());
        let uuids: Vec<_> = flattened.records.iter().map(DeviceRecord::uuid).collect();
        assert_eq!(uuids, ["gpu-0", "gpu-1", "rdma-0", "rdma-1"]);

        let gpu1 = &flattened.records[1];
        assert_eq!(gpu1.node_id(), 1);
        assert_eq!(gpu1.pcie_id(), "p1");
        assert_eq!(gpu1.bus_id(), "0000:81:00.0");
        assert_eq!(gpu1.device_type(), DeviceType::Gpu);
    }

    #[test]
    fn flatten_rejects_bad_devices() {
        let mut inventory = NodeDeviceInventory::new();
        inventory.insert(DeviceType::Gpu, "0", info("gpu-0", 0, "p0", "0000:01:00.0"));
        inventory.insert(DeviceType::Gpu, "1", info("gpu-1", -1, "p0", "0000:02:00.0"));
        inventory.insert(DeviceType::Rdma, "0", info("gpu-0", 0, "p0", "0000:03:00.0"));

        let flattened = inventory.flatten();
        assert_eq!(flattened.records.len(), 1);
        assert_eq!(
            flattened.rejected,
            [
                RejectedDevice::Invalid {
                    device_type: DeviceType::Gpu,
                    device_id: "1".to_string(),
                    source: InvalidDeviceRecord::NegativeNodeId {
                        uuid: "gpu-1".to_string(),
                        node_id: -1,
                    },
                },
                RejectedDevice::DuplicateUuid {
                    device_type: DeviceType::Rdma,
                    device_id: "0".to_string(),
                    uuid: "gpu-0".to_string(),
                },
            ]
        );
    }

    #[test]
    fn invalid_device_does_not_claim_its_uuid() {
        let mut inventory = NodeDeviceInventory::new();
        inventory.insert(DeviceType::Gpu, "0", info("x", -1, "p0", "0000:01:00.0"));
        inventory.insert(DeviceType::Gpu, "1", info("x", 0, "p0", "0000:02:00.0"));

        let flattened = inventory.flatten();
        let uuids: Vec<_> = flattened.records.iter().map(DeviceRecord::uuid).collect();
        assert_eq!(uuids, ["x"]);
        assert_eq!(flattened.records[0].bus_id(), "0000:02:00.0");
        assert_eq!(flattened.rejected.len(), 1);
        assert!(matches!(
            &flattened.rejected[0],
            RejectedDevice::Invalid { device_id, .. } if device_id == "0"
        ));
    }

    #[test]
    fn empty_uuids_are_not_duplicates() {
        let mut inventory = NodeDeviceInventory::new();
        inventory.insert(DeviceType::Xpu, "0", info("", 0, "", ""));
        inventory.insert(DeviceType::Xpu, "1", info("", 0, "", ""));
        assert_eq!(inventory.flatten().records.len(), 2);
        assert_eq!(inventory.len(), 2);
    }

    const YAML: &str = r#"
worker-1:
  gpu:
    "0":
      uuid: GPU-0
      minor: 0
      topology: { socketID: 0, nodeID: 0, pcieID: pci0, busID: "0000:3b:00.0" }
  rdma:
    "0":
      uuid: RDMA-0
      topology: { nodeID: 1, pcieID: pci1, busID: "0000:af:00.0" }
worker-2: {}
"#;

    #[test]
    fn load_yaml_and_json() {
        let scratch = ScratchDir::new();
        let yaml_path = scratch.path().join("inventory.yaml");
        fs::write(&yaml_path, YAML).unwrap();
        let inventory = load_inventory_from_file(&yaml_path).unwrap();

        assert_eq!(inventory.keys().collect::<Vec<_>>(), ["worker-1", "worker-2"]);
        assert!(inventory["worker-2"].is_empty());
        let devices: Vec<_> = inventory["worker-1"].iter().collect();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].0, DeviceType::Gpu);
        assert_eq!(devices[0].2.topology.socket_id, Some(0));
        assert_eq!(devices[1].0, DeviceType::Rdma);
        assert_eq!(devices[1].2.topology.node_id, 1);

        let json_path = scratch.path().join("inventory.JSON");
        fs::write(&json_path, serde_json::to_string(&inventory).unwrap()).unwrap();
        assert_eq!(load_inventory_from_file(&json_path).unwrap(), inventory);
    }

    #[test]
    fn load_rejects_unknown_device_type() {
        let scratch = ScratchDir::new();
        let path = scratch.path().join("inventory.yml");
        fs::write(&path, "worker-1:\n  tpu: {}\n").unwrap();
        assert!(matches!(
            load_inventory_from_file(&path),
            Err(InventoryError::Yaml { .. })
        ));
    }

    #[test]
    fn load_requires_known_extension() {
        assert!(matches!(
            load_inventory_from_file("/nonexistent/inventory"),
            Err(InventoryError::MissingExtension(_))
        ));
        assert!(matches!(
            load_inventory_from_file("/nonexistent/inventory.toml"),
            Err(InventoryError::UnsupportedExtension(ext)) if ext == "toml"
        ));
        assert!(matches!(
            load_inventory_from_file("/nonexistent/inventory.json"),
            Err(InventoryError::Read { .. })
        ));
    }
}
