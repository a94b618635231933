//! Core library for signpass.
//!
//! Turns a directory of plain files into a signed `.pkpass` archive:
//!
//! ```text
//! input dir --stage--> workspace --identify--> pass.json serialNumber
//!           --manifest--> manifest.json --sign--> signature
//!           --archive--> <uuid>.pkpass --deliver--> output dir --clean--> (gone)
//! ```
//!
//! The pipeline is driven by [`PackageBuilder`]; each step is a typestate
//! transition in [`package`], so steps cannot run out of order.

pub mod archive;
pub mod builder;
pub mod config;
pub mod error;
pub mod exec;
pub mod export;
pub mod fsutil;
pub mod hash;
pub mod manifest;
pub mod package;
pub mod reporter;
pub mod signing;

pub use builder::PackageBuilder;
pub use config::{Credentials, PackConfig, Passphrase, SignerConfig};
pub use error::{ErrorKind, PackError};
pub use hash::{ContentDigest, DigestAlgorithm};
pub use manifest::Manifest;
pub use package::{PackOutcome, Stage};
pub use reporter::{NullReporter, Reporter};
pub use signing::{OpensslSigner, SigningClient, SigningError};

/// Pass descriptor at the package root.
pub const PASS_JSON: &str = "pass.json";

/// Manifest written into the workspace before signing.
pub const MANIFEST_JSON: &str = "manifest.json";

/// Detached DER signature over `manifest.json`.
pub const SIGNATURE: &str = "signature";

/// Finder metadata files stripped before the manifest is built.
pub const DS_STORE: &str = ".DS_Store";

/// Extension of the produced archive (without the dot).
pub const PKPASS_EXT: &str = "pkpass";

/// File name of the archive produced for `identifier`.
pub fn pkpass_name(identifier: &str) -> String {
    format!("{identifier}.{PKPASS_EXT}")
}
