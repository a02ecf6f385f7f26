// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-node manifest generation.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use topology::build_root;

use crate::config::{CodecError, GeneratorConfig};
use crate::inventory::{Inventory, NodeDeviceInventory, RejectedDevice};
use crate::writer::{WriteError, is_staging_name, write_manifest};

#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Longest uninterrupted sleep of a pause between nodes.
const PAUSE_SLICE: Duration = Duration::from_millis(10);

/// Errors which stop a generation run before any node is processed.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("device inventory is empty")]
    EmptyInventory,
}

/// Errors which prevent the manifest of one node from being written.
///
/// They never affect other nodes of the same run.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("\"{0}\" cannot be used as a manifest file name")]
    InvalidNodeName(String),
    #[error("failed to encode manifest: {0}")]
    Encode(#[source] CodecError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// A manifest written for one node.
#[derive(Debug)]
pub struct NodeManifest {
    /// Where the manifest was written.
    pub path: PathBuf,
    /// Number of device leaves in the manifest.
    pub devices: usize,
    /// Inventory entries left out of the manifest.
    pub rejected: Vec<RejectedDevice>,
}

/// Outcome of a generation run, node by node.
#[derive(Debug, Default)]
pub struct GenerationReport {
    nodes: BTreeMap<String, Result<NodeManifest, NodeError>>,
    cancelled: bool,
}

impl GenerationReport {
    /// Per-node outcomes of the nodes processed so far, by node name.
    #[must_use]
    pub fn nodes(&self) -> &BTreeMap<String, Result<NodeManifest, NodeError>> {
        &self.nodes
    }

    /// The outcome for `node_name`, if that node was processed.
    #[must_use]
    pub fn node(&self, node_name: &str) -> Option<&Result<NodeManifest, NodeError>> {
        self.nodes.get(node_name)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &NodeManifest)> {
        self.nodes
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().ok().map(|m| (name.as_str(), m)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &NodeError)> {
        self.nodes
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().err().map(|e| (name.as_str(), e)))
    }

    /// Whether the run stopped early because it was cancelled.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// True if every node of the inventory got its manifest.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.nodes.values().all(Result::is_ok)
    }
}

/// Writes one topology manifest per node of an [`Inventory`].
///
/// Nodes are handled one at a time, in node name order.  Failures are local to
/// their node: they are logged, recorded in the [`GenerationReport`], and the
/// run moves on to the next node.
#[derive(Clone, Debug, Default)]
pub struct ManifestGenerator {
    config: GeneratorConfig,
}

impl ManifestGenerator {
    #[must_use]
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The file the manifest of `node_name` is written to.
    ///
    /// # Errors
    ///
    /// Rejects names which are not a single plain path component (empty,
    /// `.`, `..`, or containing a separator), since the manifest would
    /// otherwise land outside the manifest directory.  Names shaped like the
    /// staging file of an atomic write (`.<name>.tmp`) are rejected too.
    pub fn manifest_path(&self, node_name: &str) -> Result<PathBuf, NodeError> {
        let mut components = Path::new(node_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None)
                if name == node_name && !is_staging_name(node_name) =>
            {
                Ok(self.config.directory.join(name))
            }
            _ => Err(NodeError::InvalidNodeName(node_name.to_owned())),
        }
    }

    /// Waits `node_pause` between two nodes, or until `cancel` fires.
    fn pause(&self, cancel: &CancellationToken) {
        let deadline = Instant::now() + self.config.node_pause;
        while !cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(PAUSE_SLICE));
        }
    }

    /// Builds, encodes and writes the manifest of a single node.
    ///
    /// # Errors
    ///
    /// See [`NodeError`].
    pub fn generate_node(
        &self,
        node_name: &str,
        inventory: &NodeDeviceInventory,
    ) -> Result<NodeManifest, NodeError> {
        let path = self.manifest_path(node_name)?;
        let flattened = inventory.flatten();
        for rejected in &flattened.rejected {
            warn!("node {node_name}: leaving device out of manifest: {rejected}");
        }
        let root = build_root(&flattened.records);
        let text = self.config.format.encode(&root).map_err(NodeError::Encode)?;
        trace!("manifest of node {node_name}:\n{text}");
        write_manifest(&path, text.as_bytes(), self.config.write_mode)?;
        Ok(NodeManifest {
            path,
            devices: flattened.records.len(),
            rejected: flattened.rejected,
        })
    }

    /// Writes the manifest of every node in `inventory`.
    ///
    /// `cancel` is checked before each node and during pauses; once it fires
    /// the run stops and
    /// the report only covers the nodes handled so far.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::EmptyInventory`] (and writes nothing) if
    /// `inventory` has no nodes.  Per-node failures are reported in the
    /// [`GenerationReport`] instead.
    pub fn generate(
        &self,
        inventory: &Inventory,
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, GenerateError> {
        if inventory.is_empty() {
            error!("device inventory is empty, no manifest generated");
            return Err(GenerateError::EmptyInventory);
        }

        let mut report = GenerationReport::default();
        for (index, (node_name, node_inventory)) in inventory.iter().enumerate() {
            if index > 0 && !self.config.node_pause.is_zero() {
                self.pause(cancel);
            }
            if cancel.is_cancelled() {
                warn!(
                    "manifest generation cancelled with {} of {} nodes done",
                    report.nodes.len(),
                    inventory.len()
                );
                report.cancelled = true;
                break;
            }

            debug!("generating manifest for node {node_name}");
            let outcome = self.generate_node(node_name, node_inventory);
            match &outcome {
                Ok(manifest) => info!(
                    "wrote manifest for node {node_name} to {} ({} devices)",
                    manifest.path.display(),
                    manifest.devices
                ),
                Err(e) => error!("failed to generate manifest for node {node_name}: {e}"),
            }
            report.nodes.insert(node_name.clone(), outcome);
        }
        Ok(report)
    }
}

/// Writes one manifest per node with `config`, without cancellation.
///
/// Returns `false` only if `inventory` is empty; per-node failures are logged
/// but do not change the result.  Use [`ManifestGenerator::generate`] to learn
/// which nodes failed.
#[must_use]
pub fn generate_manifests(inventory: &Inventory, config: GeneratorConfig) -> bool {
    ManifestGenerator::new(config)
        .generate(inventory, &CancellationToken::new())
        .is_ok()
}
