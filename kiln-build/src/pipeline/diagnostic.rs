//! Diagnostic types for the build pipeline.
//!
//! This module provides types for the errors and warnings recorded while a
//! build runs.

use serde::Serialize;

use super::Stage;

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// An error that stops the build after the current stage.
    Error,
    /// A warning that doesn't stop the build but should be addressed.
    Warning,
}

impl Severity {
    /// Returns true if this is an error severity.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message from a build stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// The stage that produced this diagnostic.
    pub stage: Stage,
    /// Numeric code from [`kiln_core::codes`]; `0` for messages without one.
    pub number: i32,
    pub message: String,
    /// Optional location (e.g., "product.kiln:12" or a file path).
    pub location: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(stage: Stage, number: i32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            stage,
            number,
            message: message.into(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            stage,
            number: 0,
            message: message.into(),
            location: None,
        }
    }

    /// Add a location to this diagnostic.
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// The `KILN0110` style code, if this diagnostic has one.
    pub fn code(&self) -> Option<String> {
        (self.number != 0).then(|| format!("KILN{:04}", self.number))
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{}[{}]: {}", self.severity, code, self.message)?,
            None => write!(f, "{}: {}", self.severity, self.message)?,
        }
        if let Some(loc) = &self.location {
            write!(f, " (at {})", loc)?;
        }
        Ok(())
    }
}

/// Render an error and its chain of sources on one line.
pub(crate) fn describe(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_error() {
        let diag = Diagnostic::error(Stage::Link, 311, "unresolved reference");
        assert!(diag.severity.is_error());
        assert_eq!(diag.stage, Stage::Link);
        assert_eq!(diag.code().as_deref(), Some("KILN0311"));
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error(Stage::Compile, 110, "failed to parse source document")
            .at("product.kiln:3");
        insta::assert_snapshot!(diag, @"error[KILN0110]: failed to parse source document (at product.kiln:3)");

        let warning = Diagnostic::warning(Stage::Link, "library supplied twice");
        insta::assert_snapshot!(warning, @"warning: library supplied twice");
    }

    #[test]
    fn test_describe_includes_sources() {
        let error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(describe(&error), "gone");
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Error.to_string(), "error");
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
