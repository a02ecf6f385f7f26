// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Manifest generation settings.

use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use topology::TopologyNode;

/// Directory downstream schedulers read device manifests from.
pub const DEFAULT_MANIFEST_DIR: &str = "/tmp/koordinator/devieTopoInfo/";

/// Text encoding of a manifest.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum ManifestFormat {
    /// JSON indented by two spaces.
    #[default]
    Json,
    Yaml,
}

/// Errors from encoding or decoding a manifest.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ManifestFormat {
    /// Encodes `root` in this format.  The text always ends with a newline.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if the tree cannot be encoded.
    pub fn encode(self, root: &TopologyNode) -> Result<String, CodecError> {
        let mut text = match self {
            ManifestFormat::Json => serde_json::to_string_pretty(root)?,
            ManifestFormat::Yaml => serde_yaml_ng::to_string(root)?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }

    /// Decodes a tree previously produced by [`ManifestFormat::encode`].
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error if `text` is not a valid manifest.
    pub fn decode(self, text: &str) -> Result<TopologyNode, CodecError> {
        Ok(match self {
            ManifestFormat::Json => serde_json::from_str(text)?,
            ManifestFormat::Yaml => serde_yaml_ng::from_str(text)?,
        })
    }
}

/// How a manifest reaches its final path.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum WriteMode {
    /// Write a hidden temporary file in the manifest directory, sync it, and
    /// rename it over the manifest.  Readers see either the old or the new
    /// manifest, never a partial one.
    #[default]
    Atomic,
    /// Truncate and rewrite the manifest in place.
    Truncate,
}

/// Settings of a [`crate::ManifestGenerator`].
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
pub struct GeneratorConfig {
    /// Directory manifests are written to.  It must already exist.
    #[builder(setter(into), default = PathBuf::from(DEFAULT_MANIFEST_DIR))]
    pub directory: PathBuf,

    #[builder(default)]
    pub format: ManifestFormat,

    #[builder(default)]
    pub write_mode: WriteMode,

    /// Pause between two nodes.
    #[builder(default = Duration::ZERO)]
    pub node_pause: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_MANIFEST_DIR),
            format: ManifestFormat::default(),
            write_mode: WriteMode::default(),
            node_pause: Duration::ZERO,
        }
    }
}

impl Display for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        writeln!(f, "Manifest generator config")?;
        writeln!(f, "  directory : {}", self.directory.display())?;
        writeln!(f, "  format    : {}", self.format)?;
        writeln!(f, "  write mode: {}", self.write_mode)?;
        write!(f, "  node pause: {:?}", self.node_pause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use topology::{DeviceRecord, DeviceType, build_root};

    #[test]
    fn builder_defaults_match_default() {
        let built = GeneratorConfigBuilder::default().build().unwrap();
        assert_eq!(built, GeneratorConfig::default());
        assert_eq!(built.directory, PathBuf::from("/tmp/koordinator/devieTopoInfo/"));
    }

    #[test]
    fn builder_overrides() {
        let config = GeneratorConfigBuilder::default()
            .directory("/var/lib/devtopo")
            .format(ManifestFormat::Yaml)
            .write_mode(WriteMode::Truncate)
            .node_pause(Duration::from_millis(5))
            .build()
            .unwrap();
        assert_eq!(config.directory, PathBuf::from("/var/lib/devtopo"));
        assert_eq!(config.format, ManifestFormat::Yaml);
        assert_eq!(config.write_mode, WriteMode::Truncate);
        assert_eq!(config.node_pause, Duration::from_millis(5));
    }

    #[test]
    fn option_names() {
        assert_eq!(ManifestFormat::from_str("yaml").unwrap(), ManifestFormat::Yaml);
        assert_eq!(WriteMode::from_str("truncate").unwrap(), WriteMode::Truncate);
        assert_eq!(WriteMode::Atomic.to_string(), "atomic");
        assert!(ManifestFormat::from_str("xml").is_err());
    }

    #[test]
    fn both_formats_decode_what_they_encode() {
        let devices = [
            DeviceRecord::new(0, "p0", "0000:01:00.0", DeviceType::Gpu, "gpu-0").unwrap(),
            DeviceRecord::new(1, "", "", DeviceType::Rdma, "vf-0").unwrap(),
        ];
        let root = build_root(&devices);
        for format in [ManifestFormat::Json, ManifestFormat::Yaml] {
            let text = format.encode(&root).unwrap();
            assert!(text.ends_with('\n'));
            assert_eq!(format.decode(&text).unwrap(), root, "{format}");
        }
    }

    #[test]
    fn yaml_uses_wire_field_names() {
        let devices = [DeviceRecord::new(0, "p0", "", DeviceType::Fpga, "fpga-0").unwrap()];
        let text = ManifestFormat::Yaml.encode(&build_root(&devices)).unwrap();
        assert!(text.starts_with("nodeID: -1\ntype: root\nchildren:\n"), "{text}");
        assert!(text.contains("pcieID: p0"));
        assert!(!text.contains("busID"));
    }
}
