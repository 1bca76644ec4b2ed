//! Bind stage: emit the package and its debug-symbol side-file.
//!
//! A package is written as:
//!
//! ```text
//! magic     8 bytes   "KILNPKG\0"
//! manifest  u64 length + JSON { codepage, platform, records }
//! cabinet   remaining bytes (empty for uncompressed packages)
//! ```
//!
//! Nothing in a package depends on time or fresh identities, so binding the
//! same resolved output twice yields identical bytes.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use kiln_core::{Fingerprint, Platform, codes, write_file};
use kiln_ir::{FieldValue, FileSource, Intermediate, Record, RecordRef};
use serde::Serialize;
use tracing::debug;

use super::{
    DelayedField, FileTransfer, ResolveResult,
    cabinet::{CabinetEntry, cabinet},
    resolve::BIND_PREFIX,
};
use crate::{BinderExtension, Diagnostic, Messaging, Stage, pipeline::extension::check_hook};

pub const PACKAGE_MAGIC: &[u8; 8] = b"KILNPKG\0";

pub struct BindContext {
    pub resolved: ResolveResult,
    pub output_path: PathBuf,
    pub pdb_path: PathBuf,
    /// Staging area for extracted and emitted files.
    pub intermediate_folder: PathBuf,
    pub cab_cache_path: Option<PathBuf>,
    pub platform: Platform,
    pub extensions: Vec<Arc<dyn BinderExtension>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindResult {
    pub file_transfers: Vec<FileTransfer>,
    /// Content files the package was built from.
    pub content_file_paths: Vec<PathBuf>,
}

/// Facts about one `File` record, available as `!(bind.<fact>.<FileId>)`.
#[derive(Debug, Clone)]
struct FileFacts {
    source: PathBuf,
    size: u64,
    hash: Fingerprint,
    name: String,
}

impl FileFacts {
    fn get(&self, property: &str) -> Option<String> {
        match property {
            "fileSize" => Some(self.size.to_string()),
            "fileHash" => Some(self.hash.to_string()),
            "fileName" => Some(self.name.clone()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct PackageManifest<'a> {
    codepage: u32,
    platform: Platform,
    records: &'a [Record],
}

/// Bind the resolved output.
///
/// The package and side-file are staged in the intermediate folder; the
/// returned transfers move them into place.
pub fn bind(ctx: BindContext, messaging: &Messaging) -> Option<BindResult> {
    let errors_before = messaging.error_count();
    let ResolveResult {
        codepage,
        delayed_fields,
        expected_embedded_files,
        mut intermediate,
    } = ctx.resolved;

    for extension in &ctx.extensions {
        let result = extension.pre_bind(&mut intermediate);
        if !check_hook(messaging, Stage::Bind, extension.name(), result) {
            return None;
        }
    }

    extract_embedded_files(&mut intermediate, &ctx.intermediate_folder, messaging);
    for path in &expected_embedded_files {
        if !path.is_file() {
            messaging.error(
                Stage::Bind,
                codes::BIND_IO,
                format!("expected file '{}' no longer exists", path.display()),
            );
        }
    }
    if messaging.error_count() > errors_before {
        return None;
    }

    let files = gather_files(&intermediate, messaging);
    resolve_delayed_fields(&mut intermediate, &delayed_fields, &files, messaging);
    if messaging.error_count() > errors_before {
        return None;
    }

    let compressed = intermediate
        .records_of("Package")
        .find_map(|r| r.field("compressed").and_then(FieldValue::as_bool))
        .unwrap_or(true);

    let mut result = BindResult {
        file_transfers: Vec::new(),
        content_file_paths: files.values().map(|f| f.source.clone()).collect(),
    };

    let cabinet_bytes = if compressed {
        let entries: Vec<CabinetEntry> = files
            .iter()
            .map(|(id, facts)| CabinetEntry {
                name: id.clone(),
                source: facts.source.clone(),
                hash: facts.hash.clone(),
            })
            .collect();
        match cabinet(&entries, ctx.cab_cache_path.as_deref()) {
            Ok((bytes, reused)) => {
                debug!(files = entries.len(), reused, "built cabinet");
                bytes
            }
            Err(err) => {
                messaging.error(
                    Stage::Bind,
                    codes::BIND_IO,
                    format!("failed to build cabinet: {}", err),
                );
                return None;
            }
        }
    } else {
        let out_dir = ctx.output_path.parent().unwrap_or(Path::new(""));
        result.file_transfers.extend(
            files
                .values()
                .map(|facts| FileTransfer::copy(&facts.source, out_dir.join(&facts.name))),
        );
        Vec::new()
    };

    let records = package_records(&intermediate.records, &files, compressed);
    let package = match package_bytes(codepage, ctx.platform, &records, &cabinet_bytes) {
        Ok(package) => package,
        Err(err) => {
            messaging.error(
                Stage::Bind,
                codes::BIND_IO,
                format!("failed to serialize package manifest: {}", err),
            );
            return None;
        }
    };

    let staged_package = staging_path(&ctx.intermediate_folder, &ctx.output_path);
    if let Err(err) = write_file(&staged_package, &package) {
        messaging.error(
            Stage::Bind,
            codes::BIND_IO,
            format!("failed to write '{}': {}", staged_package.display(), err),
        );
        return None;
    }

    let staged_pdb = staging_path(&ctx.intermediate_folder, &ctx.pdb_path);
    if let Err(err) = intermediate.save(&staged_pdb) {
        messaging.error(
            Stage::Bind,
            err.number(),
            format!("failed to write '{}': {}", staged_pdb.display(), err),
        );
        return None;
    }

    result
        .file_transfers
        .push(FileTransfer::moved(staged_package, &ctx.output_path));
    result
        .file_transfers
        .push(FileTransfer::moved(staged_pdb, &ctx.pdb_path));

    for extension in &ctx.extensions {
        let hook = extension.post_bind(&result);
        if !check_hook(messaging, Stage::Bind, extension.name(), hook) {
            return None;
        }
    }

    debug!(
        package = %ctx.output_path.display(),
        bytes = package.len(),
        compressed,
        "bound package"
    );
    Some(result)
}

fn staging_path(folder: &Path, output: &Path) -> PathBuf {
    folder.join(output.file_name().unwrap_or(output.as_os_str()))
}

/// Write embedded library files to disk and point their records at them.
fn extract_embedded_files(intermediate: &mut Intermediate, folder: &Path, messaging: &Messaging) {
    let embedded = std::mem::take(&mut intermediate.embedded_files);
    if embedded.is_empty() {
        return;
    }

    let mut extracted = IndexMap::new();
    for (key, bytes) in embedded {
        let path = folder.join("embedded").join(&key);
        match write_file(&path, bytes) {
            Ok(()) => {
                extracted.insert(key, path);
            }
            Err(err) => messaging.error(
                Stage::Bind,
                codes::BIND_IO,
                format!("failed to extract embedded file '{}': {}", key, err),
            ),
        }
    }

    for record in &mut intermediate.records {
        for value in record.fields.values_mut() {
            if let FieldValue::File(FileSource::Embedded(key)) = value
                && let Some(path) = extracted.get(key.as_str())
            {
                *value = FieldValue::File(FileSource::Path(path.clone()));
            }
        }
    }
}

fn gather_files(intermediate: &Intermediate, messaging: &Messaging) -> IndexMap<String, FileFacts> {
    let mut files = IndexMap::new();

    for record in intermediate.records_of("File") {
        let Some(source) = record.field("source").and_then(FieldValue::as_path) else {
            continue;
        };

        let facts = std::fs::metadata(source)
            .and_then(|meta| Ok((meta.len(), Fingerprint::of_file(source)?)));
        match facts {
            Ok((size, hash)) => {
                let name = record
                    .field("name")
                    .and_then(FieldValue::as_str)
                    .map(String::from)
                    .or_else(|| {
                        source
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                    })
                    .unwrap_or_else(|| record.id.clone());
                files.insert(
                    record.id.clone(),
                    FileFacts {
                        source: source.to_path_buf(),
                        size,
                        hash,
                        name,
                    },
                );
            }
            Err(err) => messaging.write(
                Diagnostic::error(
                    Stage::Bind,
                    codes::BIND_IO,
                    format!(
                        "failed to read '{}' for File '{}': {}",
                        source.display(),
                        record.id,
                        err
                    ),
                )
                .at(record.location()),
            ),
        }
    }

    files
}

fn resolve_delayed_fields(
    intermediate: &mut Intermediate,
    delayed: &[DelayedField],
    files: &IndexMap<String, FileFacts>,
    messaging: &Messaging,
) {
    let mut failed: HashSet<(RecordRef, String)> = HashSet::new();

    for field in delayed {
        let record = intermediate
            .records
            .iter_mut()
            .find(|r| r.kind == field.record.kind && r.id == field.record.id);
        let Some(record) = record else {
            messaging.error(
                Stage::Bind,
                codes::INVALID_DELAYED_FIELD,
                format!("delayed field '{}' of {} no longer exists", field.field, field.record),
            );
            continue;
        };
        let location = record.location();

        let outcome = match record.fields.get_mut(&field.field) {
            Some(FieldValue::String(text)) => {
                substitute_bind_values(text, files).map(|resolved| *text = resolved)
            }
            Some(other) => Err(format!(
                "delayed field '{}' of {} is a {}, not a string",
                field.field,
                field.record,
                other.type_name()
            )),
            None => Err(format!(
                "delayed field '{}' of {} no longer exists",
                field.field, field.record
            )),
        };

        if let Err(message) = outcome {
            messaging.write(
                Diagnostic::error(Stage::Bind, codes::INVALID_DELAYED_FIELD, message).at(location),
            );
            failed.insert((field.record.clone(), field.field.clone()));
        }
    }

    for record in &intermediate.records {
        for (name, value) in &record.fields {
            let FieldValue::String(text) = value else {
                continue;
            };
            if text.contains(BIND_PREFIX) && !failed.contains(&(record.key(), name.clone())) {
                messaging.write(
                    Diagnostic::error(
                        Stage::Bind,
                        codes::UNRESOLVED_DELAYED_FIELD,
                        format!(
                            "field '{}' of {} still holds a bind-time reference",
                            name,
                            record.key()
                        ),
                    )
                    .at(record.location()),
                );
            }
        }
    }
}

/// Replace `!(bind.<property>.<FileId>)` references with file facts.
fn substitute_bind_values(
    text: &str,
    files: &IndexMap<String, FileFacts>,
) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(BIND_PREFIX) {
        let after = &rest[start + BIND_PREFIX.len()..];
        let Some(end) = after.find(')') else {
            break;
        };
        out.push_str(&rest[..start]);

        let reference = &after[..end];
        let (property, file_id) = reference
            .split_once('.')
            .ok_or_else(|| format!("malformed bind reference '!(bind.{})'", reference))?;
        let facts = files
            .get(file_id)
            .ok_or_else(|| format!("'!(bind.{})' refers to unknown File '{}'", reference, file_id))?;
        let value = facts.get(property).ok_or_else(|| {
            format!(
                "unknown bind property '{}' in '!(bind.{})' (expected fileSize, fileHash or fileName)",
                property, reference
            )
        })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Records as written into the package: file sources become cabinet
/// entries, or paths relative to the package for uncompressed layouts.
fn package_records(
    records: &[Record],
    files: &IndexMap<String, FileFacts>,
    compressed: bool,
) -> Vec<Record> {
    records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if record.kind == "File"
                && let Some(facts) = files.get(&record.id)
            {
                let source = if compressed {
                    FileSource::Embedded(record.id.clone())
                } else {
                    FileSource::Path(PathBuf::from(&facts.name))
                };
                record
                    .fields
                    .insert("source".to_string(), FieldValue::File(source));
            }
            record.source = None;
            record
        })
        .collect()
}

fn package_bytes(
    codepage: u32,
    platform: Platform,
    records: &[Record],
    cabinet: &[u8],
) -> serde_json::Result<Vec<u8>> {
    let manifest = serde_json::to_vec(&PackageManifest {
        codepage,
        platform,
        records,
    })?;

    let mut out = Vec::with_capacity(PACKAGE_MAGIC.len() + 8 + manifest.len() + cabinet.len());
    out.extend_from_slice(PACKAGE_MAGIC);
    out.extend_from_slice(&(manifest.len() as u64).to_le_bytes());
    out.extend_from_slice(&manifest);
    out.extend_from_slice(cabinet);
    Ok(out)
}
