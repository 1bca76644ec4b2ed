//! Build command report.

use std::path::PathBuf;

use kiln_build::{Diagnostic, OutputKind, Severity};

use super::output::{Output, Report};

/// The outcome of one build.
#[derive(Debug)]
pub struct BuildReport {
    pub output_path: PathBuf,
    pub output_kind: OutputKind,
    /// Exit status returned by the build.
    pub status: i32,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

impl Report for BuildReport {
    fn render(&self, out: &mut dyn Output) {
        for diagnostic in &self.diagnostics {
            let line = diagnostic.to_string();
            match diagnostic.severity {
                Severity::Error => out.error(&line),
                Severity::Warning => out.warning(&line),
            }
        }

        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning);
        if !self.diagnostics.is_empty() {
            out.newline();
        }

        if self.status == 0 {
            let mut summary = format!(
                "built {} '{}'",
                self.output_kind,
                self.output_path.display()
            );
            if warnings > 0 {
                summary.push_str(&format!(" with {} warning(s)", warnings));
            }
            out.info(&summary);
        } else {
            out.error(&format!(
                "build failed with {} error(s) and {} warning(s) (exit status {})",
                errors, warnings, self.status
            ));
        }
    }
}
