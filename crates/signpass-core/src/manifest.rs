//! Manifest construction.
//!
//! The manifest maps each top-level file of the workspace to its content
//! digest. Subdirectories are not descended into; files nested below the
//! root are not covered by the signature.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PackError;
use crate::hash::{ContentDigest, DigestAlgorithm};
use crate::{MANIFEST_JSON, SIGNATURE};

/// Digest map of a staged file set.
///
/// Keys are sorted, so serialization is byte-stable for a fixed input set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ContentDigest>,
}

impl Manifest {
    /// Scan the top level of `dir` and hash every regular file.
    ///
    /// Directories and the reserved artifact names ([`MANIFEST_JSON`],
    /// [`SIGNATURE`]) are skipped. A single unreadable file aborts the scan.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Io`] if the directory cannot be listed or any
    /// file cannot be read, [`PackError::InvalidName`] for a file name that
    /// is not UTF-8.
    pub fn build(dir: &Path, algorithm: DigestAlgorithm) -> Result<Self, PackError> {
        let mut entries = BTreeMap::new();

        let listing = std::fs::read_dir(dir).map_err(|e| PackError::io(dir, e))?;
        for entry in listing {
            let entry = entry.map_err(|e| PackError::io(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| PackError::io(&path, e))?;
            if file_type.is_dir() {
                continue;
            }

            let name = utf8_name(&entry)?;
            if is_reserved(&name) {
                continue;
            }

            let digest = algorithm.digest_file(&path)?;
            debug!(file = %name, digest = %digest, "hashed");
            entries.insert(name, digest);
        }

        Ok(Self { entries })
    }

    /// Serialize as a flat JSON object. These are the bytes that get signed.
    ///
    /// # Errors
    ///
    /// Serialization of a string map cannot fail in practice; the error is
    /// surfaced as [`PackError::Format`] against `manifest.json`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PackError> {
        serde_json::to_vec(&self.entries).map_err(|e| PackError::Format {
            path: MANIFEST_JSON.into(),
            reason: e.to_string(),
        })
    }

    /// Digest recorded for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ContentDigest> {
        self.entries.get(name)
    }

    /// Number of files covered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no file is covered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(file name, digest)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContentDigest)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The entry's file name, or [`PackError::InvalidName`] if it is not UTF-8.
pub(crate) fn utf8_name(entry: &std::fs::DirEntry) -> Result<String, PackError> {
    entry
        .file_name()
        .into_string()
        .map_err(|_| PackError::InvalidName { path: entry.path() })
}

/// Names that are produced by the pipeline and never listed in a manifest.
pub fn is_reserved(name: &str) -> bool {
    name == MANIFEST_JSON || name == SIGNATURE
}
