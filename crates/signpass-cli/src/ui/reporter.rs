//! Console implementation of [`Reporter`].

use crossterm::style::Stylize;
use signpass_core::{Reporter, Stage};

use super::theme::Theme;

/// Prints pipeline progress to stderr, one line per stage.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    theme: Theme,
}

impl ConsoleReporter {
    /// Reporter with the default theme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Final line for a successful command.
    pub fn success(&self, msg: &str) {
        let theme = &self.theme;
        eprintln!(
            "  {} {}",
            theme.icons.success.with(theme.colors.success),
            msg
        );
    }

    /// Final line for a failed command.
    pub fn error(&self, msg: &str) {
        let theme = &self.theme;
        eprintln!(
            "  {} {}",
            theme.icons.error.with(theme.colors.error),
            msg.with(theme.colors.error)
        );
    }

    fn stage_line(&self, stage: Stage, detail: &str) -> String {
        let theme = &self.theme;
        let label = format!("{:<width$}", stage.to_string(), width = theme.label_width);
        format!(
            "  {} {} {}",
            theme.icons.success.with(theme.colors.success),
            label.with(theme.colors.label),
            detail.with(theme.colors.secondary)
        )
    }
}

impl Reporter for ConsoleReporter {
    fn stage(&self, stage: Stage, detail: &str) {
        eprintln!("{}", self.stage_line(stage, detail));
    }

    fn info(&self, msg: &str) {
        let theme = &self.theme;
        eprintln!(
            "  {} {}",
            theme.icons.info.with(theme.colors.secondary),
            msg
        );
    }

    fn warning(&self, msg: &str) {
        let theme = &self.theme;
        eprintln!(
            "  {} {}",
            theme.icons.warning.with(theme.colors.warning),
            msg.with(theme.colors.warning)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_line_names_stage_and_detail() {
        let line = ConsoleReporter::new().stage_line(Stage::Manifested, "generated manifest (3 files)");
        assert!(line.contains("manifested"));
        assert!(line.contains("generated manifest (3 files)"));
    }
}
