//! `signpass pack`

use anyhow::{Context, Result};
use signpass_core::config::{RawConfig, RawCredentials, RawSigner};
use signpass_core::{OpensslSigner, PackageBuilder, Passphrase};
use tracing::debug;

use crate::PackArgs;
use crate::ui::ConsoleReporter;

/// Build one signed package and print its path on stdout.
pub fn pack(args: PackArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => {
            debug!(config = %path.display(), "loading config file");
            RawConfig::load(path)?
        }
        None => RawConfig::default(),
    };
    let (config, signer_config) = file.overlay(raw_from_args(args)).resolve()?;

    let signer = OpensslSigner::new(signer_config);
    let reporter = ConsoleReporter::new();
    let outcome = PackageBuilder::new(&config, &signer)
        .with_reporter(&reporter)
        .build()
        .inspect_err(|e| reporter.error(&e.to_string()))
        .with_context(|| format!("Failed to package {}", config.input_dir.display()))?;

    reporter.success(&format!("Created {}", outcome.output.display()));
    println!("{}", outcome.output.display());
    Ok(())
}

/// Command-line values as the top configuration layer.
fn raw_from_args(args: PackArgs) -> RawConfig {
    RawConfig {
        raw: args.raw,
        output_dir: args.dir,
        workspace_root: args.workspace_root,
        digest: args.digest,
        credentials: RawCredentials {
            wwdr: args.wwdr,
            signer: args.signer,
            key: args.key,
            password: args.pass.map(Passphrase::new),
        },
        signer: RawSigner {
            program: args.openssl,
            timeout_secs: args.timeout,
        },
    }
}
