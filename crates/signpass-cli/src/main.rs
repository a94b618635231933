//! signpass - signed pass packages from a directory

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use signpass_cli::cmd;
use signpass_cli::cmd::export::ExportKind;
use signpass_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Pack(args) => cmd::pack::pack(args),
        Commands::Cert(args) => cmd::export::export(ExportKind::Certificate, &args),
        Commands::Key(args) => cmd::export::export(ExportKind::PrivateKey, &args),
    }
}
