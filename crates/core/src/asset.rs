// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File assets: handles to bytes that originate on the controller.
//!
//! An action stores asset references instead of raw content; the transport
//! substitutes them with variants that can produce the bytes wherever the
//! action actually runs.

use crate::error::ActionError;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read buffer used when hashing or copying asset contents.
const HASH_BUF: usize = 40960;

/// Contents up to this size are cached in memory after a hash pass.
const CACHE_LIMIT: usize = 16384;

/// Fetches a controller-side file through a transport channel.
pub trait FetchFile: Send + Sync {
    fn fetch(&self, path: &Path, out: &mut dyn Write) -> Result<(), ActionError>;
}

/// Handle to file content owned by the controller.
#[derive(Clone)]
pub enum FileAsset {
    /// A file on the controller filesystem.
    Local {
        path: PathBuf,
        cached: Option<Vec<u8>>,
    },
    /// An entry inside a zip archive on the controller.
    Zip {
        archive: PathBuf,
        path: String,
        cached: Option<Vec<u8>>,
    },
    /// Transport-side replacement that pulls bytes from the controller
    /// through the file service on demand. Never produced by deserialisation.
    Remote {
        path: PathBuf,
        fetch: Arc<dyn FetchFile>,
    },
}

impl FileAsset {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        FileAsset::Local {
            path: path.into(),
            cached: None,
        }
    }

    pub fn zip(archive: impl Into<PathBuf>, path: impl Into<String>) -> Self {
        FileAsset::Zip {
            archive: archive.into(),
            path: path.into(),
            cached: None,
        }
    }

    /// Contents cached in memory, when a previous hash pass stored them.
    pub fn cached(&self) -> Option<&[u8]> {
        match self {
            FileAsset::Local { cached, .. } | FileAsset::Zip { cached, .. } => cached.as_deref(),
            FileAsset::Remote { .. } => None,
        }
    }

    fn set_cached(&mut self, bytes: Vec<u8>) {
        match self {
            FileAsset::Local { cached, .. } | FileAsset::Zip { cached, .. } => {
                *cached = Some(bytes);
            }
            FileAsset::Remote { .. } => {}
        }
    }

    /// Open the asset contents for reading.
    ///
    /// Cached bytes are served from memory; zip entries and remote fetches
    /// are buffered, plain files are streamed.
    pub fn open(&self) -> Result<Box<dyn Read + '_>, ActionError> {
        if let Some(bytes) = self.cached() {
            return Ok(Box::new(Cursor::new(bytes)));
        }
        match self {
            FileAsset::Local { path, .. } => Ok(Box::new(File::open(path)?)),
            FileAsset::Zip { archive, path, .. } => {
                Ok(Box::new(Cursor::new(read_zip_entry(archive, path)?)))
            }
            FileAsset::Remote { path, fetch } => {
                let mut buf = Vec::new();
                fetch.fetch(path, &mut buf)?;
                Ok(Box::new(Cursor::new(buf)))
            }
        }
    }

    /// Copy the asset contents into `out`.
    pub fn copy_to(&self, out: &mut dyn Write) -> Result<(), ActionError> {
        let mut reader = self.open()?;
        std::io::copy(&mut reader, out)?;
        Ok(())
    }

    /// Read the full asset contents into memory.
    pub fn read_all(&self) -> Result<Vec<u8>, ActionError> {
        let mut buf = Vec::new();
        self.copy_to(&mut buf)?;
        Ok(buf)
    }

    /// Force the full contents into the in-memory cache, regardless of size.
    ///
    /// Transports use this for assets whose bytes cannot be re-fetched on
    /// the remote side.
    pub fn cache_contents(&mut self) -> Result<(), ActionError> {
        if self.cached().is_none() {
            let bytes = self.read_all()?;
            self.set_cached(bytes);
        }
        Ok(())
    }

    /// Hex sha1 of the asset contents.
    ///
    /// Stream-hashes with a fixed-size buffer; contents of at most 16 KiB
    /// are cached in memory as a side effect.
    pub fn sha1sum(&mut self) -> Result<String, ActionError> {
        let mut hasher = Sha1::new();
        let mut to_cache: Option<Vec<u8>> = Some(Vec::new());
        let mut size = 0usize;
        {
            let mut reader = self.open()?;
            let mut buf = vec![0u8; HASH_BUF];
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                size += n;
                if size > CACHE_LIMIT {
                    to_cache = None;
                } else if let Some(cache) = to_cache.as_mut() {
                    cache.extend_from_slice(&buf[..n]);
                }
                hasher.update(&buf[..n]);
            }
        }
        if let Some(cache) = to_cache {
            self.set_cached(cache);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Hex sha1 of an arbitrary byte stream, with the same buffering as
    /// [`FileAsset::sha1sum`].
    pub fn stream_sha1(reader: &mut dyn Read) -> Result<String, ActionError> {
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; HASH_BUF];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn read_zip_entry(archive: &Path, entry: &str) -> Result<Vec<u8>, ActionError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| ActionError::Message(format!("cannot open archive {:?}: {}", archive, e)))?;
    let mut member = zip.by_name(entry).map_err(|e| {
        ActionError::Message(format!("cannot read {:?} from {:?}: {}", entry, archive, e))
    })?;
    let mut buf = Vec::new();
    member.read_to_end(&mut buf)?;
    Ok(buf)
}

impl fmt::Debug for FileAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAsset::Local { path, cached } => f
                .debug_struct("Local")
                .field("path", path)
                .field("cached", &cached.as_ref().map(Vec::len))
                .finish(),
            FileAsset::Zip {
                archive,
                path,
                cached,
            } => f
                .debug_struct("Zip")
                .field("archive", archive)
                .field("path", path)
                .field("cached", &cached.as_ref().map(Vec::len))
                .finish(),
            FileAsset::Remote { path, .. } => {
                f.debug_struct("Remote").field("path", path).finish()
            }
        }
    }
}

impl PartialEq for FileAsset {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                FileAsset::Local { path: a, cached: ca },
                FileAsset::Local { path: b, cached: cb },
            ) => a == b && ca == cb,
            (
                FileAsset::Zip {
                    archive: aa,
                    path: pa,
                    cached: ca,
                },
                FileAsset::Zip {
                    archive: ab,
                    path: pb,
                    cached: cb,
                },
            ) => aa == ab && pa == pb && ca == cb,
            _ => false,
        }
    }
}

/// Wire form: `{type: "local"|"zip", path, archive?, cached?}` with cached
/// bytes carried as base64 text.
#[derive(Serialize, Deserialize)]
struct AssetWire {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    archive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cached: Option<String>,
}

impl Serialize for FileAsset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            FileAsset::Local { path, cached } => AssetWire {
                kind: "local".to_string(),
                path: path.to_string_lossy().into_owned(),
                archive: None,
                cached: cached.as_deref().map(|b| BASE64_STANDARD.encode(b)),
            },
            FileAsset::Zip {
                archive,
                path,
                cached,
            } => AssetWire {
                kind: "zip".to_string(),
                path: path.clone(),
                archive: Some(archive.to_string_lossy().into_owned()),
                cached: cached.as_deref().map(|b| BASE64_STANDARD.encode(b)),
            },
            // A remote asset round-trips back to the controller as the plain
            // local file it stands for.
            FileAsset::Remote { path, .. } => AssetWire {
                kind: "local".to_string(),
                path: path.to_string_lossy().into_owned(),
                archive: None,
                cached: None,
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FileAsset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = AssetWire::deserialize(deserializer)?;
        let cached = wire
            .cached
            .map(|text| {
                BASE64_STANDARD
                    .decode(&text)
                    .map_err(|_| D::Error::custom("asset cached bytes are not valid base64"))
            })
            .transpose()?;
        match wire.kind.as_str() {
            "local" => Ok(FileAsset::Local {
                path: PathBuf::from(wire.path),
                cached,
            }),
            "zip" => {
                let archive = wire
                    .archive
                    .ok_or_else(|| D::Error::custom("zip asset without archive"))?;
                Ok(FileAsset::Zip {
                    archive: PathBuf::from(archive),
                    path: wire.path,
                    cached,
                })
            }
            other => Err(D::Error::custom(format!(
                "unknown file asset type {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
#[path = "asset_tests.rs"]
mod tests;
