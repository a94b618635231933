//! Run configuration.
//!
//! A run is described by one immutable [`PackConfig`] plus the
//! [`SignerConfig`] of the subprocess signer. Both are resolved once from a
//! [`RawConfig`], which layers an optional TOML file under command-line
//! values:
//!
//! ```toml
//! output_dir = "passes"
//! workspace_root = "/var/tmp"
//! digest = "sha1"
//!
//! [credentials]
//! wwdr = "certs/AppleWWDRCA.pem"
//! signer = "certs/pass.pem"
//! key = "certs/pass.key"
//!
//! [signer]
//! program = "/usr/local/opt/openssl/bin/openssl"
//! timeout_secs = 30
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::hash::DigestAlgorithm;

/// Default signer executable, looked up on `PATH`.
pub const DEFAULT_OPENSSL: &str = "openssl";

/// Default deadline for one signer invocation.
pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors raised while loading or resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying cause.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Parser diagnostic.
        source: toml::de::Error,
    },

    /// Required parameters were supplied neither on the command line nor in the file.
    #[error("Missing required parameters: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

/// Private key passphrase. Never printed.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wrap a plaintext passphrase.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The plaintext, for handing to the signer.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the passphrase is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

impl fmt::Display for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Signing inputs handed to a [`SigningClient`](crate::SigningClient).
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Trust anchor (WWDR intermediate) certificate.
    pub trust_anchor: PathBuf,
    /// Pass type certificate.
    pub signer_cert: PathBuf,
    /// Private key of the pass type certificate.
    pub signer_key: PathBuf,
    /// Passphrase protecting `signer_key`.
    pub passphrase: Passphrase,
}

/// Settings for the subprocess signer.
#[derive(Debug, Clone)]
pub struct SignerConfig {
    /// Executable to run.
    pub program: PathBuf,
    /// Deadline after which the signer is killed.
    pub timeout: Duration,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_OPENSSL),
            timeout: DEFAULT_SIGN_TIMEOUT,
        }
    }
}

/// Everything one pipeline run needs. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct PackConfig {
    /// Directory holding `pass.json` and the pass assets.
    pub input_dir: PathBuf,
    /// Existing directory that receives the `.pkpass`.
    pub output_dir: PathBuf,
    /// Parent of the per-run workspace; system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
    /// Digest used for manifest entries.
    pub digest: DigestAlgorithm,
    /// Signing inputs.
    pub credentials: Credentials,
}

/// Credential section of [`RawConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCredentials {
    /// Trust anchor certificate path.
    pub wwdr: Option<PathBuf>,
    /// Signer certificate path.
    pub signer: Option<PathBuf>,
    /// Signer key path.
    pub key: Option<PathBuf>,
    /// Key passphrase.
    pub password: Option<Passphrase>,
}

/// Signer section of [`RawConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSigner {
    /// Signer executable.
    pub program: Option<PathBuf>,
    /// Deadline in seconds.
    pub timeout_secs: Option<u64>,
}

/// Unresolved configuration: every field optional, layered by [`RawConfig::overlay`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Input directory.
    pub raw: Option<PathBuf>,
    /// Output directory.
    pub output_dir: Option<PathBuf>,
    /// Workspace parent directory.
    pub workspace_root: Option<PathBuf>,
    /// Manifest digest.
    pub digest: Option<DigestAlgorithm>,
    /// Signing inputs.
    #[serde(default)]
    pub credentials: RawCredentials,
    /// Signer settings.
    #[serde(default)]
    pub signer: RawSigner,
}

impl RawConfig {
    /// Load a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer `top` over `self`; values present in `top` win.
    #[must_use]
    pub fn overlay(self, top: Self) -> Self {
        Self {
            raw: top.raw.or(self.raw),
            output_dir: top.output_dir.or(self.output_dir),
            workspace_root: top.workspace_root.or(self.workspace_root),
            digest: top.digest.or(self.digest),
            credentials: RawCredentials {
                wwdr: top.credentials.wwdr.or(self.credentials.wwdr),
                signer: top.credentials.signer.or(self.credentials.signer),
                key: top.credentials.key.or(self.credentials.key),
                password: top.credentials.password.or(self.credentials.password),
            },
            signer: RawSigner {
                program: top.signer.program.or(self.signer.program),
                timeout_secs: top.signer.timeout_secs.or(self.signer.timeout_secs),
            },
        }
    }

    /// Turn the layered values into a runnable configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every absent required value.
    /// An empty passphrase counts as absent.
    pub fn resolve(self) -> Result<(PackConfig, SignerConfig), ConfigError> {
        let mut missing = Vec::new();
        let password = self.credentials.password.filter(|p| !p.is_empty());

        if self.credentials.wwdr.is_none() {
            missing.push("wwdr");
        }
        if self.credentials.signer.is_none() {
            missing.push("signer");
        }
        if self.credentials.key.is_none() {
            missing.push("key");
        }
        if self.raw.is_none() {
            missing.push("raw");
        }
        if password.is_none() {
            missing.push("pass");
        }
        if self.output_dir.is_none() {
            missing.push("dir");
        }

        let (
            Some(trust_anchor),
            Some(signer_cert),
            Some(signer_key),
            Some(passphrase),
            Some(input_dir),
            Some(output_dir),
        ) = (
            self.credentials.wwdr,
            self.credentials.signer,
            self.credentials.key,
            password,
            self.raw,
            self.output_dir,
        )
        else {
            return Err(ConfigError::Missing(missing));
        };

        let pack = PackConfig {
            input_dir,
            output_dir,
            workspace_root: self.workspace_root,
            digest: self.digest.unwrap_or_default(),
            credentials: Credentials {
                trust_anchor,
                signer_cert,
                signer_key,
                passphrase,
            },
        };
        let signer = SignerConfig {
            program: self
                .signer
                .program
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OPENSSL)),
            timeout: self
                .signer
                .timeout_secs
                .map_or(DEFAULT_SIGN_TIMEOUT, Duration::from_secs),
        };

        Ok((pack, signer))
    }
}
