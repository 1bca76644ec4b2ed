//! Core primitives for the kiln installer toolset.
//!
//! This crate provides fundamental types shared by every stage of the
//! build: diagnostic codes, container versions, target platforms, content
//! fingerprints and file writing rules.

pub mod codes;
mod file;
mod fingerprint;
mod platform;
mod version;

// File operations
pub use file::{Overwrite, write_file};
// Hashing and identities
pub use fingerprint::{Fingerprint, new_identity};
pub use platform::Platform;
pub use version::Version;
