//! Build orchestration for the kiln installer toolset.
//!
//! This crate drives source documents through the build stages and routes
//! the result according to the requested [`OutputKind`]:
//!
//! ```text
//! sources → compile ─┬─ Library      → library ─────────────→ .kilnlib
//!                    ├─ Intermediate → link ────────────────→ .kilnout
//!                    └─ Package      → link → resolve → bind → layout
//! ```
//!
//! Every stage writes to one shared [`Messaging`] sink and the orchestrator
//! checks it after each stage; a recorded error stops the remaining stages
//! and its code becomes the exit status of [`BuildCommand::execute`].
//!
//! # Module Organization
//!
//! - [`pipeline`] - diagnostics sink, extension capabilities and the stages
//! - [`options`] - the typed boundary inputs of a build
//! - [`loaders`] - library container and localization file loading

pub mod loaders;
pub mod options;
pub mod pipeline;

mod files;

pub use options::{BindPath, BuildOptions, OutputKind, SourceUnit};
pub use pipeline::{
    BinderExtension, BuildCommand, Diagnostic, Extensions, LinkerExtension, Messaging, Severity,
    Stage,
};
