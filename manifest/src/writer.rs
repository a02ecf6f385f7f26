// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Persisting manifests to disk and reading them back.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use topology::TopologyNode;

use crate::config::{CodecError, ManifestFormat, WriteMode};

#[allow(unused)]
use tracing::{debug, warn};

/// Errors which may occur while writing a manifest file.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to open file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write to file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to sync file {}: {source}", path.display())]
    Sync {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Errors which may occur while reading a manifest file.
#[derive(Debug, thiserror::Error)]
pub enum ManifestReadError {
    #[error("failed to read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode manifest {}: {source}", path.display())]
    Decode { path: PathBuf, source: CodecError },
}

const STAGING_PREFIX: &str = ".";
const STAGING_SUFFIX: &str = ".tmp";

/// Name of the temporary file an atomic write of `path` goes through.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(STAGING_PREFIX);
    name.push(path.file_name().unwrap_or_default());
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

/// Whether `name` has the shape of a staging file name.  A manifest with such
/// a name could be clobbered by the atomic write of another manifest.
pub(crate) fn is_staging_name(name: &str) -> bool {
    name.len() > STAGING_PREFIX.len() + STAGING_SUFFIX.len()
        && name.starts_with(STAGING_PREFIX)
        && name.ends_with(STAGING_SUFFIX)
}

/// Makes a completed rename in the directory holding `path` durable.
fn sync_parent(path: &Path) -> Result<(), WriteError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    File::open(dir)
        .and_then(|dir| dir.sync_all())
        .map_err(|source| WriteError::Sync {
            path: dir.to_owned(),
            source,
        })
}

fn write_in_place(path: &Path, contents: &[u8], sync: bool) -> Result<(), WriteError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|source| WriteError::Open {
            path: path.to_owned(),
            source,
        })?;
    file.write_all(contents).map_err(|source| WriteError::Write {
        path: path.to_owned(),
        source,
    })?;
    if sync {
        file.sync_all().map_err(|source| WriteError::Sync {
            path: path.to_owned(),
            source,
        })?;
    }
    Ok(())
}

/// Writes `contents` to `path` following `mode`.
///
/// With [`WriteMode::Atomic`] the contents land in a hidden staging file next
/// to `path` first; the staging file is removed if anything goes wrong.
///
/// # Errors
///
/// Returns the failing step together with the path it failed on.
pub fn write_manifest(path: &Path, contents: &[u8], mode: WriteMode) -> Result<(), WriteError> {
    match mode {
        WriteMode::Truncate => write_in_place(path, contents, false),
        WriteMode::Atomic => {
            let staging = staging_path(path);
            let result = write_in_place(&staging, contents, true).and_then(|()| {
                fs::rename(&staging, path).map_err(|source| WriteError::Rename {
                    from: staging.clone(),
                    to: path.to_owned(),
                    source,
                })
            });
            if result.is_err() {
                if let Err(e) = fs::remove_file(&staging) {
                    debug!("could not remove staging file {}: {e}", staging.display());
                }
            }
            result?;
            sync_parent(path)
        }
    }
}

/// Reads and decodes the manifest at `path`.
///
/// # Errors
///
/// Fails if the file cannot be read or does not hold a manifest in `format`.
pub fn read_manifest(
    path: impl AsRef<Path>,
    format: ManifestFormat,
) -> Result<TopologyNode, ManifestReadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ManifestReadError::Read {
        path: path.to_owned(),
        source,
    })?;
    format
        .decode(&text)
        .map_err(|source| ManifestReadError::Decode {
            path: path.to_owned(),
            source,
        })
}
