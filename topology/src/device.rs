// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flat device records.
//!
//! A [`DeviceRecord`] is the canonical unit the tree builder consumes: one
//! physical or virtual device together with its topology coordinates.

/// The NUMA node id reserved for the synthetic root of a topology tree.
///
/// Real devices never carry this id.
pub const ROOT_NODE_ID: i32 = -1;

/// Category of a device.
///
/// The string form (used on the wire and as inventory keys) is the lowercase
/// variant name.
///
/// # Examples
///
/// ```
/// use devtopo_topology::DeviceType;
/// use std::str::FromStr;
///
/// assert_eq!(DeviceType::Gpu.to_string(), "gpu");
/// assert_eq!(DeviceType::from_str("rdma").unwrap(), DeviceType::Rdma);
/// assert!(DeviceType::from_str("NUMA").is_err());
/// ```
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum DeviceType {
    /// Graphics / compute accelerator.
    Gpu,
    /// RDMA capable network adapter (or one of its virtual functions).
    Rdma,
    /// Field programmable gate array.
    Fpga,
    /// Any other accelerator class.
    Xpu,
}

impl From<DeviceType> for String {
    fn from(value: DeviceType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for DeviceType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Errors which may occur when constructing a [`DeviceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDeviceRecord {
    /// NUMA node ids are non-negative; `-1` is reserved for the tree root.
    #[error("device {uuid} has negative NUMA node id {node_id}")]
    NegativeNodeId {
        /// The id of the offending device.
        uuid: String,
        /// The rejected node id.
        node_id: i32,
    },
}

/// One device and its topology coordinates.
///
/// Records are immutable once built.  The `(node_id, pcie_id, bus_id)` triple
/// need not be unique across device types, but `uuid` is unique within one
/// node's inventory.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub struct DeviceRecord {
    #[cfg_attr(any(test, feature = "serde"), serde(rename = "nodeID"))]
    node_id: i32,
    #[cfg_attr(any(test, feature = "serde"), serde(rename = "pcieID"))]
    pcie_id: String,
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(rename = "busID", skip_serializing_if = "String::is_empty")
    )]
    bus_id: String,
    #[cfg_attr(any(test, feature = "serde"), serde(rename = "type"))]
    device_type: DeviceType,
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(skip_serializing_if = "String::is_empty")
    )]
    uuid: String,
}

impl DeviceRecord {
    /// Creates a new record.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDeviceRecord::NegativeNodeId`] if `node_id` is negative.
    ///
    /// # Examples
    ///
    /// ```
    /// use devtopo_topology::{DeviceRecord, DeviceType};
    ///
    /// let gpu = DeviceRecord::new(0, "p0", "0000:01:00.0", DeviceType::Gpu, "gpu-1").unwrap();
    /// assert_eq!(gpu.pcie_id(), "p0");
    ///
    /// assert!(DeviceRecord::new(-1, "p0", "", DeviceType::Gpu, "gpu-2").is_err());
    /// ```
    pub fn new(
        node_id: i32,
        pcie_id: impl Into<String>,
        bus_id: impl Into<String>,
        device_type: DeviceType,
        uuid: impl Into<String>,
    ) -> Result<Self, InvalidDeviceRecord> {
        let uuid = uuid.into();
        if node_id < 0 {
            return Err(InvalidDeviceRecord::NegativeNodeId { uuid, node_id });
        }
        Ok(Self {
            node_id,
            pcie_id: pcie_id.into(),
            bus_id: bus_id.into(),
            device_type,
            uuid,
        })
    }

    /// NUMA node the device is attached to.
    #[must_use]
    pub fn node_id(&self) -> i32 {
        self.node_id
    }

    /// PCIe switch / bus group of the device.  May be empty.
    #[must_use]
    pub fn pcie_id(&self) -> &str {
        &self.pcie_id
    }

    /// PCI bus address of the device.  Empty for virtual devices.
    #[must_use]
    pub fn bus_id(&self) -> &str {
        &self.bus_id
    }

    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
}
