//! Layout stage: place outputs and write build-tracking manifests.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use kiln_core::{Overwrite, codes, write_file};
use tracing::debug;

use crate::{Diagnostic, Messaging, Stage};

/// How a file reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Copy,
    Move,
    /// Falls back to a copy when a link cannot be created.
    Hardlink,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Copy => write!(f, "copy"),
            TransferKind::Move => write!(f, "move"),
            TransferKind::Hardlink => write!(f, "hardlink"),
        }
    }
}

/// One instruction to place a file at its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: TransferKind,
    pub overwrite: Overwrite,
}

impl FileTransfer {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, kind: TransferKind) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind,
            overwrite: Overwrite::Always,
        }
    }

    pub fn copy(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(source, destination, TransferKind::Copy)
    }

    pub fn moved(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::new(source, destination, TransferKind::Move)
    }

    pub fn with_overwrite(mut self, overwrite: Overwrite) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[derive(Debug, Default)]
pub struct LayoutContext {
    pub file_transfers: Vec<FileTransfer>,
    /// Content files consumed by the build.
    pub content_file_paths: Vec<PathBuf>,
    pub contents_file: Option<PathBuf>,
    pub outputs_file: Option<PathBuf>,
    pub built_outputs_file: Option<PathBuf>,
}

/// Execute every transfer, then write the requested manifests.
///
/// A failed transfer is reported and the remaining transfers still run;
/// nothing is retried. Returns the destinations actually written.
pub fn layout(ctx: LayoutContext, messaging: &Messaging) -> Vec<PathBuf> {
    let mut built = Vec::new();

    for transfer in &ctx.file_transfers {
        match execute(transfer, messaging) {
            Ok(true) => built.push(transfer.destination.clone()),
            Ok(false) => debug!(
                destination = %transfer.destination.display(),
                "destination exists; skipped"
            ),
            Err(err) => messaging.write(
                Diagnostic::error(
                    Stage::Layout,
                    codes::TRANSFER_FAILED,
                    format!(
                        "failed to {} '{}' to '{}': {}",
                        transfer.kind,
                        transfer.source.display(),
                        transfer.destination.display(),
                        err
                    ),
                )
                .at(transfer.destination.display().to_string()),
            ),
        }
    }

    if let Some(path) = &ctx.contents_file {
        write_manifest(path, ctx.content_file_paths.iter(), messaging);
    }
    if let Some(path) = &ctx.outputs_file {
        write_manifest(path, ctx.file_transfers.iter().map(|t| &t.destination), messaging);
    }
    if let Some(path) = &ctx.built_outputs_file {
        write_manifest(path, built.iter(), messaging);
    }

    built
}

/// Returns whether the destination was written.
fn execute(transfer: &FileTransfer, messaging: &Messaging) -> io::Result<bool> {
    let FileTransfer {
        source,
        destination,
        kind,
        overwrite,
    } = transfer;

    if source == destination {
        return Ok(true);
    }
    if overwrite.skips(destination) {
        return Ok(false);
    }
    // a missing source must leave an existing destination in place
    fs::metadata(source)?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    match kind {
        TransferKind::Copy => {
            fs::copy(source, destination)?;
        }
        TransferKind::Move => {
            if fs::rename(source, destination).is_err() {
                // rename fails across filesystems
                fs::copy(source, destination)?;
                fs::remove_file(source)?;
            }
        }
        TransferKind::Hardlink => {
            remove_existing(destination)?;
            if let Err(err) = fs::hard_link(source, destination) {
                messaging.warning(
                    Stage::Layout,
                    format!(
                        "could not hardlink '{}' ({}); copying instead",
                        destination.display(),
                        err
                    ),
                );
                fs::copy(source, destination)?;
            }
        }
    }

    debug!(
        kind = %kind,
        source = %source.display(),
        destination = %destination.display(),
        "transferred file"
    );
    Ok(true)
}

fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Write one path per line, sorted and de-duplicated.
fn write_manifest<'a>(
    path: &Path,
    entries: impl Iterator<Item = &'a PathBuf>,
    messaging: &Messaging,
) {
    let mut lines: Vec<String> = entries.map(|p| p.display().to_string()).collect();
    lines.sort();
    lines.dedup();

    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }

    if let Err(err) = write_file(path, content) {
        messaging.write(
            Diagnostic::error(
                Stage::Layout,
                codes::MANIFEST_WRITE,
                format!("failed to write manifest '{}': {}", path.display(), err),
            )
            .at(path.display().to_string()),
        );
    }
}
