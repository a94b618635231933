//! PEM export from a PKCS#12 bundle.
//!
//! Pass type certificates are issued as `.p12` files; signing needs the
//! certificate and key as separate PEM files. Export is delegated to
//! `openssl pkcs12`.
//!
//! Success is decided by the exit status and by the output file being
//! present and non-empty. Whatever openssl prints on stderr is only logged.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Passphrase, SignerConfig};
use crate::exec::{self, ExecError};

/// Diagnostic openssl prints after a successful integrity check.
const MAC_VERIFIED: &str = "MAC verified OK";

const PASSIN_ENV: &str = "SIGNPASS_PASSIN";
const PASSOUT_ENV: &str = "SIGNPASS_PASSOUT";

/// Export failures.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The built-in exporter has not been written.
    #[error("native {0} export is not implemented; use the openssl backend")]
    NativeUnsupported(ExportKind),

    /// openssl could not be run to completion.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// openssl exited unsuccessfully.
    #[error("openssl pkcs12 failed (status {code:?}): {diagnostics}")]
    Failed {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured stderr.
        diagnostics: String,
    },

    /// openssl succeeded but the output file is missing or empty.
    #[error("could not generate {}", path.display())]
    NotGenerated {
        /// Expected output path.
        path: PathBuf,
    },
}

/// What to pull out of the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// The client certificate, without keys.
    Certificate,
    /// The private key, re-encrypted with the same passphrase.
    PrivateKey,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Certificate => f.write_str("certificate"),
            Self::PrivateKey => f.write_str("key"),
        }
    }
}

/// Runs `openssl pkcs12` exports.
#[derive(Debug, Clone, Default)]
pub struct Pkcs12Exporter {
    config: SignerConfig,
}

impl Pkcs12Exporter {
    /// Create an exporter using the given openssl program and deadline.
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    /// Extract `kind` from the bundle at `input` into the PEM file `output`.
    ///
    /// # Errors
    ///
    /// [`ExportError::Exec`] if openssl cannot run, [`ExportError::Failed`]
    /// on a non-zero exit, [`ExportError::NotGenerated`] if no output was
    /// written.
    pub fn export(
        &self,
        kind: ExportKind,
        input: &Path,
        output: &Path,
        passphrase: &Passphrase,
    ) -> Result<u64, ExportError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("pkcs12").arg("-in").arg(input);
        match kind {
            ExportKind::Certificate => {
                cmd.args(["-clcerts", "-nokeys"]);
            }
            ExportKind::PrivateKey => {
                cmd.arg("-nocerts")
                    .arg("-passout")
                    .arg(format!("env:{PASSOUT_ENV}"))
                    .env(PASSOUT_ENV, passphrase.expose());
            }
        }
        cmd.arg("-out")
            .arg(output)
            .arg("-passin")
            .arg(format!("env:{PASSIN_ENV}"))
            .env(PASSIN_ENV, passphrase.expose());

        let result = exec::run(cmd, self.config.timeout)?;
        if !result.success() {
            return Err(ExportError::Failed {
                code: result.status.code(),
                diagnostics: result.stderr,
            });
        }
        if result.stderr == MAC_VERIFIED {
            debug!("pkcs12 integrity verified");
        } else if !result.stderr.is_empty() {
            warn!(diagnostics = %result.stderr, "openssl succeeded with unexpected diagnostics; treating as inconclusive");
        }

        let size = std::fs::metadata(output).map_or(0, |m| m.len());
        if size == 0 {
            return Err(ExportError::NotGenerated {
                path: output.to_path_buf(),
            });
        }

        info!(kind = %kind, output = %output.display(), "exported PEM");
        Ok(size)
    }
}

/// The built-in exporter. Always fails until one exists.
///
/// # Errors
///
/// Always returns [`ExportError::NativeUnsupported`].
pub fn export_native(kind: ExportKind) -> Result<u64, ExportError> {
    Err(ExportError::NativeUnsupported(kind))
}
