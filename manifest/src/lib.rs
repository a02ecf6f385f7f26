// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-node device topology manifests.
//!
//! Given the device inventory of every node in a cluster, the
//! [`ManifestGenerator`] builds each node's topology tree (root → NUMA node →
//! PCIe group → device) and writes it to `<directory>/<node name>`, where
//! schedulers pick it up to reason about device locality.
//!
//! ```no_run
//! use devtopo_manifest::{GeneratorConfig, ManifestGenerator, load_inventory_from_file};
//! use tokio_util::sync::CancellationToken;
//!
//! let inventory = load_inventory_from_file("/etc/devtopo/inventory.yaml").unwrap();
//! let generator = ManifestGenerator::new(GeneratorConfig::default());
//! let report = generator.generate(&inventory, &CancellationToken::new()).unwrap();
//! for (node, error) in report.failed() {
//!     eprintln!("{node}: {error}");
//! }
//! ```

#![deny(clippy::pedantic, clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod generator;
pub mod inventory;
pub mod writer;

pub use config::{
    CodecError, DEFAULT_MANIFEST_DIR, GeneratorConfig, GeneratorConfigBuilder, ManifestFormat,
    WriteMode,
};
pub use generator::{
    GenerateError, GenerationReport, ManifestGenerator, NodeError, NodeManifest,
    generate_manifests,
};
pub use inventory::{
    DeviceInfo, DeviceTopology, Flattened, Inventory, InventoryError, NodeDeviceInventory,
    RejectedDevice, load_inventory_from_file,
};
pub use writer::{ManifestReadError, WriteError, read_manifest, write_manifest};
