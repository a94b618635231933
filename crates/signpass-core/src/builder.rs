//! Pipeline orchestration.
//!
//! [`PackageBuilder`] drives one [`Package`](crate::package::Package) through
//! every state, reporting each transition. Stages run strictly in sequence:
//! the manifest must reflect the final staged tree before signing, and the
//! signature must exist before archiving.

use std::path::Path;

use tracing::{info, warn};

use crate::config::PackConfig;
use crate::error::PackError;
use crate::package::{Package, PackOutcome, Stage};
use crate::reporter::{NullReporter, Reporter};
use crate::signing::SigningClient;
use crate::DS_STORE;

static NULL_REPORTER: NullReporter = NullReporter;

/// Assembles signed `.pkpass` archives.
pub struct PackageBuilder<'a> {
    config: &'a PackConfig,
    signer: &'a dyn SigningClient,
    reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for PackageBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageBuilder")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> PackageBuilder<'a> {
    /// Create a builder for `config` that signs through `signer`.
    pub fn new(config: &'a PackConfig, signer: &'a dyn SigningClient) -> Self {
        Self {
            config,
            signer,
            reporter: &NULL_REPORTER,
        }
    }

    /// Send progress to `reporter` instead of discarding it.
    #[must_use]
    pub fn with_reporter(mut self, reporter: &'a dyn Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run the full pipeline.
    ///
    /// The input directory is checked before any workspace is created, and a
    /// workspace root inside the input tree is refused. On
    /// failure the workspace is left on disk and its location is logged.
    ///
    /// # Errors
    ///
    /// Returns the first [`PackError`] raised by any stage. A failure to
    /// remove the workspace after delivery is not an error; it is returned
    /// in [`PackOutcome::cleanup_error`].
    pub fn build(&self) -> Result<PackOutcome, PackError> {
        let input = &self.config.input_dir;
        if !input.is_dir() {
            return Err(PackError::NotFound {
                path: input.clone(),
            });
        }

        reject_nested_workspace(self.config.workspace_root.as_deref(), input)?;

        let package = Package::create(self.config.workspace_root.as_deref())?;
        let workspace = package.location().to_path_buf();
        self.reporter
            .stage(Stage::Created, &format!("temp dir at {}", workspace.display()));

        self.run(package).inspect_err(|err| {
            warn!(workspace = %workspace.display(), error = %err, "pipeline failed; workspace left on disk");
            self.reporter.warning(&format!(
                "Workspace left at {} for inspection",
                workspace.display()
            ));
        })
    }

    fn run(&self, package: Package) -> Result<PackOutcome, PackError> {
        let config = self.config;

        let staged = package.stage_from(&config.input_dir)?;
        self.reporter.stage(Stage::Staged, "copied pass to temp directory");

        let identified = staged.assign_identifier()?;
        self.reporter.stage(
            Stage::Identified,
            &format!("updated serial number {}", identified.identifier()),
        );

        let manifested = identified.build_manifest(config.digest)?;
        if manifested.markers_removed() > 0 {
            self.reporter.info(&format!(
                "removed {} {DS_STORE} file(s)",
                manifested.markers_removed()
            ));
        }
        self.reporter.stage(
            Stage::Manifested,
            &format!("generated manifest ({} files)", manifested.manifest().len()),
        );

        let signed = manifested.sign(self.signer, &config.credentials)?;
        self.reporter.stage(Stage::Signed, "signed the manifest");

        let archived = signed.archive()?;
        self.reporter.stage(Stage::Archived, "compressed the pass");

        let delivered = archived.deliver(&config.output_dir)?;
        self.reporter.stage(Stage::Delivered, "copied pass to output directory");

        let outcome = delivered.clean();
        match &outcome.cleanup_error {
            None => self.reporter.stage(Stage::Cleaned, "removed temp directory"),
            Some(err) => {
                warn!(error = %err, "workspace cleanup failed");
                self.reporter.warning(&err.to_string());
            }
        }

        info!(output = %outcome.output.display(), serial = %outcome.identifier, "package complete");
        Ok(outcome)
    }
}

/// Refuse a workspace root that lives under `input`.
///
/// A root that cannot be resolved is let through; creating the workspace
/// reports it.
fn reject_nested_workspace(root: Option<&Path>, input: &Path) -> Result<(), PackError> {
    let root = root.map_or_else(std::env::temp_dir, Path::to_path_buf);
    let input_real = std::fs::canonicalize(input).map_err(|e| PackError::from_io(input, e))?;
    let Ok(root_real) = std::fs::canonicalize(&root) else {
        return Ok(());
    };
    if root_real.starts_with(&input_real) {
        return Err(PackError::NestedWorkspace {
            root,
            input: input.to_path_buf(),
        });
    }
    Ok(())
}
