//! Build pipeline.
//!
//! This module provides the [`BuildCommand`] orchestrator that runs the build
//! stages in order. The pipeline provides:
//!
//! - Explicit stage boundaries (compile → library | link → resolve → bind → layout)
//! - Extension capabilities invoked in registration order
//! - A single diagnostics sink shared by every stage
//!
//! # Example
//!
//! ```ignore
//! use kiln_build::{BuildCommand, BuildOptions, Extensions};
//!
//! let command = BuildCommand::new(options, Extensions::new());
//! let status = command.execute();
//!
//! for diag in command.messaging().diagnostics() {
//!     eprintln!("{}", diag);
//! }
//! ```

mod diagnostic;
mod extension;
mod messaging;
mod runner;
mod stage;
pub mod stages;

pub(crate) use diagnostic::describe;
pub use diagnostic::{Diagnostic, Severity};
pub use extension::{BinderExtension, Extensions, LinkerExtension};
pub use messaging::Messaging;
pub use runner::BuildCommand;
pub use stage::Stage;
