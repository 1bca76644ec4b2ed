//! Extension capabilities for the preprocessor and compiler.

use kiln_ir::{Record, RecordDefinition};

/// Supplies preprocessor variables under one or more prefixes.
///
/// A document referencing `$(prefix.Name)` asks the first registered
/// extension claiming `prefix` for `Name`.
pub trait PreprocessorExtension: Send + Sync {
    /// The name of this extension (for diagnostics and logging).
    fn name(&self) -> &'static str;

    /// Variable prefixes this extension answers for.
    fn prefixes(&self) -> &[&'static str];

    /// Look up a variable, or `None` if it is undefined.
    fn variable(&self, prefix: &str, name: &str) -> Option<String>;
}

/// Adds record kinds and semantic checks to the compiler.
pub trait CompilerExtension: Send + Sync {
    /// The name of this extension (for diagnostics and logging).
    fn name(&self) -> &'static str;

    /// Record kinds contributed by this extension.
    fn definitions(&self) -> Vec<RecordDefinition> {
        Vec::new()
    }

    /// Check a compiled record, returning a message when it is invalid.
    #[allow(unused_variables)]
    fn validate(&self, record: &Record) -> Result<(), String> {
        Ok(())
    }
}
