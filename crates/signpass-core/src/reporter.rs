//! Reporter trait for dependency injection
//!
//! Lets the pipeline report progress without being coupled to a terminal.

use crate::package::Stage;

/// Receives progress from a pipeline run.
pub trait Reporter: Send + Sync {
    /// The package reached `stage`; `detail` is a short human-readable note.
    fn stage(&self, stage: Stage, detail: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn stage(&self, stage: Stage, detail: &str) {
        (**self).stage(stage, detail);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn stage(&self, _: Stage, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
