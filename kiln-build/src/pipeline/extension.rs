//! Extension capabilities, one trait per stage.
//!
//! Preprocessor and compiler capabilities are defined by `kiln-source`;
//! the linker and binder capabilities live here with the stages that call
//! them. Every registry keeps registration order, and hooks run in it.

use std::sync::Arc;

use eyre::Result;
use kiln_core::codes;
use kiln_ir::{Intermediate, RecordDefinitions};
use kiln_source::{CompilerExtension, PreprocessorExtension};

use super::{Messaging, Stage, stages::BindResult};

/// Inspects or amends the linked output.
///
/// # Example
///
/// ```ignore
/// struct DefaultFeature;
///
/// impl LinkerExtension for DefaultFeature {
///     fn name(&self) -> &'static str { "default-feature" }
///
///     fn on_linked(&self, output: &mut Intermediate) -> Result<()> {
///         if output.records_of("Feature").next().is_none() {
///             output.records.push(Record::new("Feature", "Complete"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait LinkerExtension: Send + Sync {
    /// The name of this extension (for diagnostics and logging).
    fn name(&self) -> &'static str;

    /// Called once the link succeeded.
    ///
    /// # Errors
    ///
    /// An error is recorded as a link diagnostic and stops the build.
    #[allow(unused_variables)]
    fn on_linked(&self, output: &mut Intermediate) -> Result<()> {
        Ok(())
    }
}

/// Hooks around package emission.
pub trait BinderExtension: Send + Sync {
    /// The name of this extension (for diagnostics and logging).
    fn name(&self) -> &'static str;

    /// Called with the resolved intermediate before anything is emitted.
    #[allow(unused_variables)]
    fn pre_bind(&self, resolved: &mut Intermediate) -> Result<()> {
        Ok(())
    }

    /// Called after the package was emitted, before layout.
    #[allow(unused_variables)]
    fn post_bind(&self, result: &BindResult) -> Result<()> {
        Ok(())
    }
}

/// The ordered set of active extensions for a build.
#[derive(Clone, Default)]
pub struct Extensions {
    preprocessors: Vec<Arc<dyn PreprocessorExtension>>,
    compilers: Vec<Arc<dyn CompilerExtension>>,
    linkers: Vec<Arc<dyn LinkerExtension>>,
    binders: Vec<Arc<dyn BinderExtension>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preprocessor(mut self, extension: impl PreprocessorExtension + 'static) -> Self {
        self.preprocessors.push(Arc::new(extension));
        self
    }

    pub fn compiler(mut self, extension: impl CompilerExtension + 'static) -> Self {
        self.compilers.push(Arc::new(extension));
        self
    }

    pub fn linker(mut self, extension: impl LinkerExtension + 'static) -> Self {
        self.linkers.push(Arc::new(extension));
        self
    }

    pub fn binder(mut self, extension: impl BinderExtension + 'static) -> Self {
        self.binders.push(Arc::new(extension));
        self
    }

    pub fn preprocessors(&self) -> &[Arc<dyn PreprocessorExtension>] {
        &self.preprocessors
    }

    pub fn compilers(&self) -> &[Arc<dyn CompilerExtension>] {
        &self.compilers
    }

    pub fn linkers(&self) -> &[Arc<dyn LinkerExtension>] {
        &self.linkers
    }

    pub fn binders(&self) -> &[Arc<dyn BinderExtension>] {
        &self.binders
    }

    /// Built-in record kinds plus every kind contributed by a compiler extension.
    pub fn definitions(&self) -> RecordDefinitions {
        let mut definitions = RecordDefinitions::builtin();
        for extension in &self.compilers {
            for definition in extension.definitions() {
                definitions.register(definition);
            }
        }
        definitions
    }
}

/// Record a failed extension hook. Returns whether the hook succeeded.
pub(crate) fn check_hook(
    messaging: &Messaging,
    stage: Stage,
    extension: &str,
    result: Result<()>,
) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            messaging.error(
                stage,
                codes::EXTENSION_FAILED,
                format!("extension '{}' failed: {:#}", extension, err),
            );
            false
        }
    }
}
