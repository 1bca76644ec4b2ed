//! Report data structures for commands.
//!
//! Commands collect what happened into a report, then render it to an
//! [`Output`] target.

mod build;
mod output;

pub use build::BuildReport;
pub use output::{Report, TerminalOutput};
