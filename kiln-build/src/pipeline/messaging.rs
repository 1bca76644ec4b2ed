//! The build-wide diagnostics sink.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, warn};

use super::{Diagnostic, Severity, Stage};

/// Accumulates diagnostics from every stage of one build.
///
/// Safe to share between compile threads. Once an error is written the
/// sink reports [`encountered_error`](Self::encountered_error) for the rest
/// of the build; nothing clears it.
#[derive(Debug, Default)]
pub struct Messaging {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    diagnostics: Vec<Diagnostic>,
    encountered_error: bool,
    last_error_number: i32,
}

impl Messaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and emit it as a tracing event.
    pub fn write(&self, diagnostic: Diagnostic) {
        let location = diagnostic.location.as_deref().unwrap_or_default();
        match diagnostic.severity {
            Severity::Error => error!(
                stage = %diagnostic.stage,
                code = diagnostic.number,
                location,
                "{}",
                diagnostic.message
            ),
            Severity::Warning => warn!(stage = %diagnostic.stage, location, "{}", diagnostic.message),
        }

        let mut inner = self.lock();
        if diagnostic.severity.is_error() {
            inner.encountered_error = true;
            inner.last_error_number = diagnostic.number;
        }
        inner.diagnostics.push(diagnostic);
    }

    /// Record an error.
    pub fn error(&self, stage: Stage, number: i32, message: impl Into<String>) {
        self.write(Diagnostic::error(stage, number, message));
    }

    /// Record a warning.
    pub fn warning(&self, stage: Stage, message: impl Into<String>) {
        self.write(Diagnostic::warning(stage, message));
    }

    /// Whether any error has been recorded during this build.
    pub fn encountered_error(&self) -> bool {
        self.lock().encountered_error
    }

    /// Code of the most recent error, or `0` when none was recorded.
    pub fn last_error_number(&self) -> i32 {
        self.lock().last_error_number
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Snapshot of everything recorded so far, in order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().diagnostics.clone()
    }

    fn count(&self, severity: Severity) -> usize {
        self.lock()
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // diagnostics stay readable even if a compile thread panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sink_is_clean() {
        let messaging = Messaging::new();
        assert!(!messaging.encountered_error());
        assert_eq!(messaging.last_error_number(), 0);
        assert!(messaging.diagnostics().is_empty());
    }

    #[test]
    fn test_error_flag_and_last_number() {
        let messaging = Messaging::new();

        messaging.warning(Stage::Compile, "just a warning");
        assert!(!messaging.encountered_error());

        messaging.error(Stage::Compile, 110, "first");
        messaging.error(Stage::Link, 311, "second");
        messaging.warning(Stage::Link, "later warning");

        assert!(messaging.encountered_error());
        assert_eq!(messaging.last_error_number(), 311);
        assert_eq!(messaging.error_count(), 2);
        assert_eq!(messaging.warning_count(), 2);
    }

    #[test]
    fn test_shared_between_threads() {
        let messaging = Messaging::new();

        std::thread::scope(|scope| {
            for n in 0..4 {
                let messaging = &messaging;
                scope.spawn(move || messaging.error(Stage::Compile, 110, format!("unit {}", n)));
            }
        });

        assert_eq!(messaging.error_count(), 4);
        assert_eq!(messaging.last_error_number(), 110);
    }
}
