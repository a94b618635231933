//! signpass - signed pass packages from a directory
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Command-line front end over [`signpass_core`].
//!
//! # Commands
//!
//! - `signpass pack`: stage, manifest, sign, and archive a pass directory
//!   into `<serial>.pkpass`.
//! - `signpass cert` / `signpass key`: export the certificate or private key
//!   from a `.p12` bundle as PEM, ready for `pack`.

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use signpass_core::DigestAlgorithm;

/// Environment variable holding the passphrase when `--pass` is omitted.
pub const PASSWORD_ENV: &str = "SIGNPASS_PASSWORD";

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "SIGNPASS_CONFIG";

#[derive(Debug, Parser)]
#[command(name = "signpass")]
#[command(author, version, about = "signpass - build signed pass packages")]
pub struct Cli {
    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build a signed .pkpass from a pass directory
    Pack(PackArgs),
    /// Export the pass certificate from a .p12 bundle as PEM
    Cert(ExportArgs),
    /// Export the private key from a .p12 bundle as PEM
    Key(ExportArgs),
}

#[derive(Debug, Args)]
pub struct PackArgs {
    /// Intermediate (WWDR) certificate in PEM
    #[arg(short, long)]
    pub wwdr: Option<PathBuf>,
    /// Pass type certificate in PEM
    #[arg(short, long)]
    pub signer: Option<PathBuf>,
    /// Private key of the pass type certificate in PEM
    #[arg(short, long)]
    pub key: Option<PathBuf>,
    /// Directory holding pass.json and its assets
    #[arg(short, long)]
    pub raw: Option<PathBuf>,
    /// Passphrase of the private key
    #[arg(short, long, env = PASSWORD_ENV, hide_env_values = true)]
    pub pass: Option<String>,
    /// Directory to write the .pkpass into
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
    /// TOML file with defaults for any of the above
    #[arg(long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,
    /// openssl binary used for signing
    #[arg(long)]
    pub openssl: Option<PathBuf>,
    /// Seconds to wait for the signer before giving up
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Where to create the temporary workspace
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,
    /// Manifest digest (sha1 or sha256)
    #[arg(long)]
    pub digest: Option<DigestAlgorithm>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// PKCS#12 bundle (.p12)
    #[arg(short, long = "in", value_name = "P12")]
    pub input: PathBuf,
    /// PEM file to write
    #[arg(short, long = "out", value_name = "PEM")]
    pub output: PathBuf,
    /// Passphrase of the bundle
    #[arg(short, long, env = PASSWORD_ENV, hide_env_values = true)]
    pub pass: String,
    /// Use the built-in exporter instead of openssl
    #[arg(short, long)]
    pub native: bool,
    /// openssl binary
    #[arg(long)]
    pub openssl: Option<PathBuf>,
}
