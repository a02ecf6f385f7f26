// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Command line of the `devtopo` manifest generator.

#![deny(clippy::all, clippy::pedantic)]

pub use clap::Parser;
use manifest::{DEFAULT_MANIFEST_DIR, GeneratorConfig};
use manifest::{ManifestFormat, WriteMode};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default tracing filter when `--tracing` is not given.
pub const DEFAULT_TRACING: &str = "info";

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum InvalidCmdArguments {
    #[error("Manifest directory {} is not an existing directory", .0.display())]
    #[diagnostic(help("create the directory or point --manifest-dir at one"))]
    ManifestDir(PathBuf),
}

/// How often manifests are (re)generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Generate once and exit.
    Once,
    /// Regenerate every period until interrupted.
    Every(Duration),
}

/// Everything the `devtopo` binary needs to run, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    pub inventory: PathBuf,
    pub generator: GeneratorConfig,
    pub schedule: Schedule,
    pub tracing: String,
}

#[derive(Parser, Debug)]
#[command(name = "devtopo")]
#[command(version)]
#[command(about = "Writes per-node device topology manifests", long_about = None)]
pub struct CmdArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Device inventory of all nodes, as a .json, .yaml or .yml file"
    )]
    inventory: PathBuf,

    #[arg(
        long,
        value_name = "DIR",
        default_value = DEFAULT_MANIFEST_DIR,
        help = "Existing directory to write one manifest per node into"
    )]
    manifest_dir: PathBuf,

    #[arg(
        long,
        value_name = "json|yaml",
        default_value = "json",
        value_parser = ManifestFormat::from_str,
        help = "Encoding of the manifests"
    )]
    format: ManifestFormat,

    #[arg(
        long,
        value_name = "atomic|truncate",
        default_value = "atomic",
        value_parser = WriteMode::from_str,
        help = "atomic: write a temporary file, then rename it; truncate: rewrite in place"
    )]
    write_mode: WriteMode,

    #[arg(
        long,
        value_name = "MS",
        default_value_t = 0,
        help = "Pause between two nodes, in milliseconds"
    )]
    node_pause_ms: u64,

    #[arg(
        long,
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Regenerate manifests periodically, re-reading the inventory each time"
    )]
    interval_secs: Option<u64>,

    #[arg(
        long,
        value_name = "tracing configuration",
        default_value = DEFAULT_TRACING,
        help = "Tracing filter directives, e.g. info or devtopo_manifest=debug,warn"
    )]
    tracing: String,
}

impl CmdArgs {
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        match self.interval_secs {
            Some(secs) => Schedule::Every(Duration::from_secs(secs)),
            None => Schedule::Once,
        }
    }
}

impl TryFrom<CmdArgs> for RunConfiguration {
    type Error = InvalidCmdArguments;

    fn try_from(value: CmdArgs) -> Result<Self, InvalidCmdArguments> {
        let schedule = value.schedule();
        if !value.manifest_dir.is_dir() {
            return Err(InvalidCmdArguments::ManifestDir(value.manifest_dir));
        }
        let generator = GeneratorConfig {
            directory: value.manifest_dir,
            format: value.format,
            write_mode: value.write_mode,
            node_pause: Duration::from_millis(value.node_pause_ms),
        };
        Ok(RunConfiguration {
            inventory: value.inventory,
            generator,
            schedule,
            tracing: value.tracing,
        })
    }
}
