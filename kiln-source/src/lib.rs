//! Source handling for the kiln installer toolset.
//!
//! Turns source documents into compiled [`kiln_ir::Intermediate`]s in two
//! steps, and parses localization files:
//!
//! - [`preprocess`] expands variables, conditionals and includes into a
//!   [`Document`]
//! - [`compile`] parses a document into typed records and validates them
//!   against the record definitions and active [`CompilerExtension`]s
//! - [`parse_localization_file`] reads one localization file

// Miette's derive macro generates code that triggers these warnings
#![allow(unused_assignments)]

mod compile;
mod error;
mod extension;
mod localize;
mod preprocess;

pub use compile::{CompileContext, compile};
pub use error::{CompileErrors, Error, Result};
pub use extension::{CompilerExtension, PreprocessorExtension};
pub use localize::{parse_localization_file, parse_localization_str};
pub use preprocess::{Document, PreprocessContext, preprocess};
