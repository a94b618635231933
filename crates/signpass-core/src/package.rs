//! Package assembly typestate.
//!
//! Models one pipeline run as a chain of explicit state transitions:
//!
//! ```text
//! Package --stage_from()--> StagedPackage --assign_identifier()--> IdentifiedPackage
//!   --build_manifest()--> ManifestedPackage --sign()--> SignedPackage
//!   --archive()--> ArchivedPackage --deliver()--> DeliveredPackage --clean()--> PackOutcome
//! ```
//!
//! Each transition consumes the previous state, so a manifest can never be
//! built before the serial number is set, nor an archive made before the
//! signature exists. The workspace is never removed on a failed transition;
//! it stays on disk for inspection and its path is in every state.
//!
//! # Usage
//!
//! ```ignore
//! let outcome = Package::create(None)?
//!     .stage_from(&input)?
//!     .assign_identifier()?
//!     .build_manifest(DigestAlgorithm::Sha1)?
//!     .sign(&signer, &credentials)?
//!     .archive()?
//!     .deliver(&output_dir)?
//!     .clean();
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::archive::create_archive;
use crate::config::Credentials;
use crate::error::PackError;
use crate::fsutil;
use crate::hash::DigestAlgorithm;
use crate::manifest::Manifest;
use crate::signing::{SigningClient, SigningError};
use crate::{DS_STORE, MANIFEST_JSON, PASS_JSON, SIGNATURE, pkpass_name};

/// Descriptor field overwritten with the run identifier.
const SERIAL_NUMBER: &str = "serialNumber";

/// Pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Workspace exists and is empty.
    Created,
    /// Input tree copied into the workspace.
    Staged,
    /// Identifier generated and written to `pass.json`.
    Identified,
    /// `manifest.json` written.
    Manifested,
    /// `signature` written.
    Signed,
    /// `<identifier>.pkpass` written inside the workspace.
    Archived,
    /// Archive copied to the output directory.
    Delivered,
    /// Workspace removed.
    Cleaned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Staged => "staged",
            Self::Identified => "identified",
            Self::Manifested => "manifested",
            Self::Signed => "signed",
            Self::Archived => "archived",
            Self::Delivered => "delivered",
            Self::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// State 1: an exclusively owned, empty workspace.
#[derive(Debug)]
pub struct Package {
    workspace: PathBuf,
}

/// State 2: the input tree has been copied into the workspace.
#[derive(Debug)]
pub struct StagedPackage {
    workspace: PathBuf,
}

/// State 3: `pass.json` carries a fresh serial number.
#[derive(Debug)]
pub struct IdentifiedPackage {
    workspace: PathBuf,
    identifier: String,
}

/// State 4: `manifest.json` has been written.
#[derive(Debug)]
pub struct ManifestedPackage {
    workspace: PathBuf,
    identifier: String,
    manifest: Manifest,
    markers_removed: usize,
}

/// State 5: `signature` has been written and verified present.
#[derive(Debug)]
pub struct SignedPackage {
    workspace: PathBuf,
    identifier: String,
    manifest: Manifest,
}

/// State 6: the `.pkpass` exists inside the workspace.
#[derive(Debug)]
pub struct ArchivedPackage {
    workspace: PathBuf,
    identifier: String,
    manifest: Manifest,
    archive: PathBuf,
}

/// State 7: the `.pkpass` has been copied to its destination.
#[derive(Debug)]
pub struct DeliveredPackage {
    workspace: PathBuf,
    identifier: String,
    manifest: Manifest,
    output: PathBuf,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct PackOutcome {
    /// Identifier written into `pass.json` and used for the file name.
    pub identifier: String,
    /// Location of the delivered `.pkpass`.
    pub output: PathBuf,
    /// The signed manifest.
    pub manifest: Manifest,
    /// Set when the workspace could not be removed. The package itself
    /// was delivered; this is a warning, not a failed run.
    pub cleanup_error: Option<PackError>,
}

impl Package {
    /// Create a uniquely named workspace under `root` (system temp dir when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Io`] if the directory cannot be created.
    pub fn create(root: Option<&Path>) -> Result<Self, PackError> {
        let root = root.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let dir = tempfile::Builder::new()
            .prefix("signpass-")
            .tempdir_in(&root)
            .map_err(|e| PackError::io(&root, e))?;
        let workspace = dir.keep();
        info!(workspace = %workspace.display(), "created workspace");
        Ok(Self { workspace })
    }

    /// Workspace directory.
    pub fn location(&self) -> &Path {
        &self.workspace
    }

    /// Copy the full tree under `input` into the workspace.
    ///
    /// # Errors
    ///
    /// [`PackError::NotFound`] if `input` is not a directory,
    /// [`PackError::Io`] on any copy failure.
    pub fn stage_from(self, input: &Path) -> Result<StagedPackage, PackError> {
        if !input.is_dir() {
            return Err(PackError::NotFound {
                path: input.to_path_buf(),
            });
        }
        let files = fsutil::copy_dir(input, &self.workspace)?;
        info!(input = %input.display(), files, "staged input");
        Ok(StagedPackage {
            workspace: self.workspace,
        })
    }
}

impl StagedPackage {
    /// Workspace directory.
    pub fn location(&self) -> &Path {
        &self.workspace
    }

    /// Generate a random identifier and write it to `pass.json`'s `serialNumber`.
    ///
    /// # Errors
    ///
    /// [`PackError::NotFound`] if `pass.json` is missing,
    /// [`PackError::Format`] if it is not a JSON object,
    /// [`PackError::Io`] on read or write failure.
    pub fn assign_identifier(self) -> Result<IdentifiedPackage, PackError> {
        let identifier = uuid::Uuid::new_v4().to_string();
        rewrite_serial_number(&self.workspace.join(PASS_JSON), &identifier)?;
        info!(serial = %identifier, "updated serial number");
        Ok(IdentifiedPackage {
            workspace: self.workspace,
            identifier,
        })
    }
}

impl IdentifiedPackage {
    /// Workspace directory.
    pub fn location(&self) -> &Path {
        &self.workspace
    }

    /// The identifier assigned to this package.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Strip `.DS_Store` files at every level, then hash the top-level
    /// files and write `manifest.json`.
    ///
    /// # Errors
    ///
    /// [`PackError::Io`] if cleanup, hashing or the write fails.
    pub fn build_manifest(self, algorithm: DigestAlgorithm) -> Result<ManifestedPackage, PackError> {
        let markers_removed = fsutil::remove_named(&self.workspace, DS_STORE)?;
        debug!(removed = markers_removed, "cleaned {DS_STORE} files");

        let manifest = Manifest::build(&self.workspace, algorithm)?;
        let path = self.workspace.join(MANIFEST_JSON);
        fs::write(&path, manifest.to_bytes()?).map_err(|e| PackError::io(&path, e))?;
        info!(entries = manifest.len(), digest = %algorithm, "generated manifest");

        Ok(ManifestedPackage {
            workspace: self.workspace,
            identifier: self.identifier,
            manifest,
            markers_removed,
        })
    }
}

impl ManifestedPackage {
    /// Workspace directory.
    pub fn location(&self) -> &Path {
        &self.workspace
    }

    /// The manifest as written to disk.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// How many `.DS_Store` files were deleted before hashing.
    pub fn markers_removed(&self) -> usize {
        self.markers_removed
    }

    /// Sign the bytes of `manifest.json` as they are on disk and write `signature`.
    ///
    /// # Errors
    ///
    /// [`PackError::Signing`] if the signer fails, returns nothing, or the
    /// artifact is missing or empty afterwards; [`PackError::Io`] if the
    /// manifest cannot be read or the signature written.
    pub fn sign(
        self,
        signer: &dyn SigningClient,
        credentials: &Credentials,
    ) -> Result<SignedPackage, PackError> {
        let manifest_path = self.workspace.join(MANIFEST_JSON);
        let manifest_bytes =
            fs::read(&manifest_path).map_err(|e| PackError::from_io(&manifest_path, e))?;

        let signature = signer.sign(&manifest_bytes, credentials)?;
        if signature.is_empty() {
            return Err(SigningError::EmptySignature.into());
        }

        let signature_path = self.workspace.join(SIGNATURE);
        fs::write(&signature_path, &signature).map_err(|e| PackError::io(&signature_path, e))?;
        let written = fs::metadata(&signature_path).map_or(0, |m| m.len());
        if written == 0 {
            return Err(SigningError::MissingArtifact {
                path: signature_path,
            }
            .into());
        }
        info!(bytes = written, "signed manifest");

        Ok(SignedPackage {
            workspace: self.workspace,
            identifier: self.identifier,
            manifest: self.manifest,
        })
    }
}

impl SignedPackage {
    /// Workspace directory.
    pub fn location(&self) -> &Path {
        &self.workspace
    }

    /// Compress the workspace into `<identifier>.pkpass`.
    ///
    /// # Errors
    ///
    /// See [`create_archive`].
    pub fn archive(self) -> Result<ArchivedPackage, PackError> {
        let archive = create_archive(&self.workspace, &self.identifier)?;
        info!(archive = %archive.display(), "compressed pass");
        Ok(ArchivedPackage {
            workspace: self.workspace,
            identifier: self.identifier,
            manifest: self.manifest,
            archive,
        })
    }
}

impl ArchivedPackage {
    /// Workspace directory.
    pub fn location(&self) -> &Path {
        &self.workspace
    }

    /// Path of the archive inside the workspace.
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// Copy the archive into `output_dir`, keeping its file name.
    ///
    /// # Errors
    ///
    /// [`PackError::NotFound`] if the archive or `output_dir` is missing,
    /// [`PackError::OutputExists`] if the destination name is taken,
    /// [`PackError::Io`] on copy failure.
    pub fn deliver(self, output_dir: &Path) -> Result<DeliveredPackage, PackError> {
        if !self.archive.is_file() {
            return Err(PackError::NotFound { path: self.archive });
        }
        if !output_dir.is_dir() {
            return Err(PackError::NotFound {
                path: output_dir.to_path_buf(),
            });
        }

        let output = output_dir.join(pkpass_name(&self.identifier));
        let bytes = fsutil::copy_file_exclusive(&self.archive, &output)?;
        info!(output = %output.display(), bytes, "delivered pass");

        Ok(DeliveredPackage {
            workspace: self.workspace,
            identifier: self.identifier,
            manifest: self.manifest,
            output,
        })
    }
}

impl DeliveredPackage {
    /// Workspace directory.
    pub fn location(&self) -> &Path {
        &self.workspace
    }

    /// Remove the workspace. Failure is recorded in the outcome, not raised.
    pub fn clean(self) -> PackOutcome {
        let cleanup_error = match fs::remove_dir_all(&self.workspace) {
            Ok(()) => {
                info!(workspace = %self.workspace.display(), "removed workspace");
                None
            }
            Err(source) => Some(PackError::Cleanup {
                path: self.workspace,
                source,
            }),
        };

        PackOutcome {
            identifier: self.identifier,
            output: self.output,
            manifest: self.manifest,
            cleanup_error,
        }
    }
}

/// Set `serialNumber` in the descriptor at `path`, keeping every other field in place.
fn rewrite_serial_number(path: &Path, identifier: &str) -> Result<(), PackError> {
    let raw = fs::read(path).map_err(|e| PackError::from_io(path, e))?;
    let mut descriptor: Value = serde_json::from_slice(&raw).map_err(|e| PackError::Format {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let Some(fields) = descriptor.as_object_mut() else {
        return Err(PackError::Format {
            path: path.to_path_buf(),
            reason: "descriptor is not a JSON object".to_string(),
        });
    };
    fields.insert(SERIAL_NUMBER.to_string(), Value::String(identifier.to_string()));

    let updated = serde_json::to_vec(&descriptor).map_err(|e| PackError::Format {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    fs::write(path, updated).map_err(|e| PackError::io(path, e))
}
