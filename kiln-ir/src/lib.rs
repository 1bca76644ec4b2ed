//! Intermediate representation types for the kiln installer toolset.
//!
//! This crate provides the unit of exchange between build stages: the
//! [`Intermediate`], an ordered collection of typed [`Record`]s tagged with
//! a unique identity. Intermediates are produced by the compiler, combined
//! by the librarian and the linker, and persisted as binary containers.
//!
//! # Architecture
//!
//! ```text
//! source → compile → Intermediate ─┬→ library container (.kilnlib)
//!                                   └→ link (+ libraries) → resolve → bind
//! ```

mod container;
mod definition;
mod intermediate;
mod localization;
mod record;

pub use container::{CONTAINER_VERSION, ContainerError};
pub use definition::{FieldDefinition, FieldKind, RecordDefinition, RecordDefinitions};
pub use intermediate::{Intermediate, IntermediateKind};
pub use localization::Localization;
pub use record::{FieldValue, FileSource, Record, RecordRef, SourceLocation};
