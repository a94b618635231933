//! Manifest signing.
//!
//! [`SigningClient`] is the only seam between the pipeline and whatever
//! produces the detached PKCS#7 signature. [`OpensslSigner`] delegates to
//! `openssl smime`; tests substitute their own implementation.

use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Credentials, SignerConfig};
use crate::exec::{self, ExecError};

/// Child environment variable carrying the key passphrase to openssl.
const PASSIN_ENV: &str = "SIGNPASS_PASSIN";

/// Signing failures.
#[derive(Error, Debug)]
pub enum SigningError {
    /// The signer process could not be run to completion.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// The signer exited unsuccessfully.
    #[error("signer exited with {}: {diagnostics}", exit_label(.code))]
    Failed {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured stderr.
        diagnostics: String,
    },

    /// The signer reported success but produced no signature bytes.
    #[error("signer produced no signature")]
    EmptySignature,

    /// The signature artifact is absent or empty after it was written.
    #[error("signature artifact missing or empty: {}", path.display())]
    MissingArtifact {
        /// Expected location of the artifact.
        path: PathBuf,
    },

    /// Scratch files for the signer could not be written or read back.
    #[error("signer I/O at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// Underlying cause.
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

/// Produces a detached DER signature over manifest bytes.
pub trait SigningClient {
    /// Sign `manifest` with the given certificate chain and key.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] on any delegate failure. An `Ok` value is
    /// still checked by the pipeline for being non-empty.
    fn sign(&self, manifest: &[u8], credentials: &Credentials) -> Result<Vec<u8>, SigningError>;
}

/// Signs by running `openssl smime -sign -binary -outform DER`.
#[derive(Debug, Clone, Default)]
pub struct OpensslSigner {
    config: SignerConfig,
}

impl OpensslSigner {
    /// Create a signer with the given program and deadline.
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }
}

impl SigningClient for OpensslSigner {
    fn sign(&self, manifest: &[u8], credentials: &Credentials) -> Result<Vec<u8>, SigningError> {
        let scratch = tempfile::Builder::new()
            .prefix("signpass-sign-")
            .tempdir()
            .map_err(|source| SigningError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let in_file = scratch.path().join(crate::MANIFEST_JSON);
        let out_file = scratch.path().join(crate::SIGNATURE);

        std::fs::write(&in_file, manifest).map_err(|source| SigningError::Io {
            path: in_file.clone(),
            source,
        })?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(["smime", "-binary", "-sign", "-certfile"])
            .arg(&credentials.trust_anchor)
            .arg("-signer")
            .arg(&credentials.signer_cert)
            .arg("-inkey")
            .arg(&credentials.signer_key)
            .arg("-in")
            .arg(&in_file)
            .arg("-out")
            .arg(&out_file)
            .args(["-outform", "DER", "-passin"])
            .arg(format!("env:{PASSIN_ENV}"))
            .env(PASSIN_ENV, credentials.passphrase.expose());

        let output = exec::run(cmd, self.config.timeout)?;
        if !output.success() {
            return Err(SigningError::Failed {
                code: output.status.code(),
                diagnostics: output.stderr,
            });
        }
        if !output.stderr.is_empty() {
            warn!(diagnostics = %output.stderr, "signer succeeded with diagnostics; treating as inconclusive");
        }

        let signature = match std::fs::read(&out_file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SigningError::EmptySignature);
            }
            Err(source) => {
                return Err(SigningError::Io {
                    path: out_file,
                    source,
                });
            }
        };
        if signature.is_empty() {
            return Err(SigningError::EmptySignature);
        }

        debug!(bytes = signature.len(), "signature produced");
        Ok(signature)
    }
}
