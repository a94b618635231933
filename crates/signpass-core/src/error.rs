//! Pipeline errors.
//!
//! Every variant carries the path it failed on so that a caller can diagnose
//! a failed run without re-running it. [`PackError::kind`] collapses the
//! variants into the coarse classes callers usually branch on.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::result::ZipError;

use crate::signing::SigningError;

/// Errors produced while assembling a package.
#[derive(Error, Debug)]
pub enum PackError {
    /// An input directory or required file does not exist.
    #[error("Not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// A read, write, copy or delete failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// Underlying cause.
        source: io::Error,
    },

    /// The pass descriptor is not a JSON object.
    #[error("Malformed descriptor {}: {reason}", path.display())]
    Format {
        /// Path of the descriptor.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// A staged file name cannot be represented in the manifest or archive.
    #[error("File name is not valid UTF-8: {}", path.display())]
    InvalidName {
        /// The offending file.
        path: PathBuf,
    },

    /// The workspace root lies inside the input tree, so staging would copy
    /// the workspace into itself.
    #[error("Workspace root {} is inside input {}", root.display(), input.display())]
    NestedWorkspace {
        /// Configured workspace root.
        root: PathBuf,
        /// Input directory.
        input: PathBuf,
    },

    /// The external signer failed or left no usable signature.
    #[error("Signing failed: {0}")]
    Signing(#[from] SigningError),

    /// The zip container could not be written.
    #[error("Archive error at {}: {source}", path.display())]
    Archive {
        /// The archive being written.
        path: PathBuf,
        /// Underlying zip error.
        source: ZipError,
    },

    /// The delivery target already holds a file with the generated name.
    #[error("Output already exists: {}", path.display())]
    OutputExists {
        /// The conflicting destination.
        path: PathBuf,
    },

    /// The workspace could not be removed after a successful delivery.
    #[error("Failed to remove workspace {}: {source}", path.display())]
    Cleanup {
        /// The workspace directory.
        path: PathBuf,
        /// Underlying cause.
        source: io::Error,
    },
}

/// Coarse classification of a [`PackError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing input path or file.
    NotFound,
    /// Read, write, copy or delete failure.
    Io,
    /// Malformed descriptor JSON or an unrepresentable file name.
    Format,
    /// External signer failure or unverifiable output.
    Signing,
    /// Container write failure or output conflict.
    Archive,
    /// Workspace deletion failure after delivery.
    Cleanup,
}

impl PackError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Like [`PackError::io`], but a missing file becomes [`PackError::NotFound`].
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::io(path, source)
        }
    }

    /// The class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } => ErrorKind::Io,
            Self::Format { .. } | Self::InvalidName { .. } => ErrorKind::Format,
            Self::NestedWorkspace { .. } => ErrorKind::Io,
            Self::Signing(_) => ErrorKind::Signing,
            Self::Archive { .. } | Self::OutputExists { .. } => ErrorKind::Archive,
            Self::Cleanup { .. } => ErrorKind::Cleanup,
        }
    }
}
