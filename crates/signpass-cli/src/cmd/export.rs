//! `signpass cert` and `signpass key`

use anyhow::{Context, Result};
use signpass_core::export::{Pkcs12Exporter, export_native};
use signpass_core::{Passphrase, SignerConfig};

pub use signpass_core::export::ExportKind;

use crate::ExportArgs;
use crate::ui::ConsoleReporter;

/// Export `kind` from the bundle named in `args`.
pub fn export(kind: ExportKind, args: &ExportArgs) -> Result<()> {
    let reporter = ConsoleReporter::new();

    // Fail before spawning anything if the bundle is not there.
    if !args.input.is_file() {
        anyhow::bail!("Bundle not found: {}", args.input.display());
    }

    let written = if args.native {
        export_native(kind)
    } else {
        let mut config = SignerConfig::default();
        if let Some(program) = &args.openssl {
            config.program.clone_from(program);
        }
        Pkcs12Exporter::new(config).export(
            kind,
            &args.input,
            &args.output,
            &Passphrase::new(args.pass.as_str()),
        )
    }
    .inspect_err(|e| reporter.error(&e.to_string()))
    .with_context(|| format!("Failed to export {kind} from {}", args.input.display()))?;

    reporter.success(&format!(
        "Wrote {kind} to {} ({written} bytes)",
        args.output.display()
    ));
    Ok(())
}
