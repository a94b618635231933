//! Content hashing for manifest entries.
//!
//! Wallet manifests have always used SHA-1. SHA-256 is available for
//! consumers that do not need wire compatibility with that format.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::PackError;

/// Digest used for manifest entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// 160-bit SHA-1, the format wallets expect.
    #[default]
    Sha1,
    /// 256-bit SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Length of the rendered hex digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    /// Hash `data` and render it as lowercase hex.
    pub fn digest(self, data: &[u8]) -> ContentDigest {
        let hex = match self {
            Self::Sha1 => hex::encode(Sha1::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
        };
        ContentDigest(hex)
    }

    /// Read the whole file at `path` and hash its bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Io`] carrying `path` if the file cannot be read.
    pub fn digest_file(self, path: &Path) -> Result<ContentDigest, PackError> {
        let data = std::fs::read(path).map_err(|e| PackError::io(path, e))?;
        Ok(self.digest(&data))
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => f.write_str("sha1"),
            Self::Sha256 => f.write_str("sha256"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(format!("unknown digest algorithm '{other}' (expected sha1 or sha256)")),
        }
    }
}

/// Lowercase hex digest of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_known_vector() {
        let digest = DigestAlgorithm::Sha1.digest(b"abc");
        assert_eq!(digest.as_str(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn sha256_known_vector() {
        let digest = DigestAlgorithm::Sha256.digest(b"abc");
        assert_eq!(
            digest.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_len_matches_output() {
        for algo in [DigestAlgorithm::Sha1, DigestAlgorithm::Sha256] {
            assert_eq!(algo.digest(b"").as_str().len(), algo.hex_len());
        }
    }

    #[test]
    fn digest_file_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("icon.png");
        let err = DigestAlgorithm::Sha1.digest_file(&missing).unwrap_err();
        assert!(err.to_string().contains("icon.png"));
    }

    #[test]
    fn parses_names() {
        assert_eq!("SHA1".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha1));
        assert_eq!("sha-256".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha256));
        assert!("md5".parse::<DigestAlgorithm>().is_err());
    }
}
