//! The build stages, each a function from a typed context to its result.
//!
//! Stages report through the shared [`Messaging`](crate::Messaging) sink and
//! return `None` (or an empty result) when they recorded an error.

mod bind;
pub mod cabinet;
mod compile;
mod layout;
mod library;
mod link;
mod resolve;

pub use bind::{BindContext, BindResult, PACKAGE_MAGIC, bind};
pub use cabinet::CabinetEntry;
pub use compile::{CompileSettings, compile_units};
pub use layout::{FileTransfer, LayoutContext, TransferKind, layout};
pub use library::{LibraryContext, combine};
pub use link::{ENTRY_KIND, LinkContext, link};
pub use resolve::{DEFAULT_CODEPAGE, DelayedField, ResolveContext, ResolveResult, resolve};
