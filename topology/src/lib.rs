// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors
//
// # Device topology trees

//! The `topology` crate turns a flat list of devices (GPUs, RDMA adapters, ...)
//! into the locality tree schedulers reason about.
//!
//! ## Overview
//!
//! Each device is described by a [`DeviceRecord`]: its NUMA node, the PCIe
//! group (switch / bus segment) it hangs off, its bus address, its
//! [`DeviceType`] and its uuid.  [`build_tree`] groups records into
//!
//! - one **NUMA node** per distinct node id, whose children are
//! - one **PCIe group** per distinct PCIe id within that NUMA node, whose
//!   children are
//! - the **device leaves**, copies of the records.
//!
//! [`build_root`] places those NUMA subtrees under a synthetic root, which is
//! what a per-node manifest contains.
//!
//! ## Features
//!
//! - `serde`: Adds serialization support (the manifest wire format).
//! - `bolero`: Enables fuzzing support for testing.

#![deny(clippy::pedantic, clippy::unwrap_used)]

pub mod builder;
pub mod device;
pub mod node;

pub use builder::{build_root, build_tree};
pub use device::{DeviceRecord, DeviceType, InvalidDeviceRecord, ROOT_NODE_ID};
pub use node::{InvalidNodeKind, Leaves, NodeKind, TopologyNode};
