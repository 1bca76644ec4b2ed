//! Library stage: combine compiled units into one reusable intermediate.

use std::collections::HashMap;

use kiln_core::{codes, new_identity};
use kiln_ir::{
    FieldValue, FileSource, Intermediate, IntermediateKind, Localization, Record, RecordRef,
};
use tracing::debug;

use crate::{BindPath, Diagnostic, Messaging, Stage, files::find_file};

pub struct LibraryContext {
    pub intermediates: Vec<Intermediate>,
    /// Carried unresolved; consuming builds apply them.
    pub localizations: Vec<Localization>,
    /// Embed the bytes of referenced files instead of their paths.
    pub bind_files: bool,
    pub bind_paths: Vec<BindPath>,
}

/// Combine every unit into one library with a fresh identity.
///
/// Returns `None` when a conflict or a missing file was reported.
pub fn combine(ctx: LibraryContext, messaging: &Messaging) -> Option<Intermediate> {
    let mut first_seen: HashMap<RecordRef, String> = HashMap::new();
    let mut records: Vec<Record> = Vec::new();

    for record in ctx.intermediates.into_iter().flat_map(|i| i.records) {
        if let Some(first) = first_seen.get(&record.key()) {
            messaging.write(
                Diagnostic::error(
                    Stage::Library,
                    codes::LIBRARY_DUPLICATE_RECORD,
                    format!(
                        "duplicate {} '{}' (first declared at {})",
                        record.kind, record.id, first
                    ),
                )
                .at(record.location()),
            );
            continue;
        }
        first_seen.insert(record.key(), record.location());
        records.push(record);
    }

    let mut library = Intermediate::new(new_identity(), IntermediateKind::Library)
        .with_records(records);
    library.localizations = ctx.localizations;

    if ctx.bind_files {
        embed_files(&mut library, &ctx.bind_paths, messaging);
    }

    if messaging.encountered_error() {
        return None;
    }

    debug!(
        id = %library.id,
        records = library.records.len(),
        embedded = library.embedded_files.len(),
        "combined library"
    );
    Some(library)
}

/// Read every referenced file into the library, rewriting the references.
fn embed_files(library: &mut Intermediate, bind_paths: &[BindPath], messaging: &Messaging) {
    for record in &mut library.records {
        let base_dir = record
            .source
            .as_ref()
            .and_then(|s| s.file.parent().map(|p| p.to_path_buf()));
        let location = record.location();

        for value in record.fields.values_mut() {
            let FieldValue::File(FileSource::Path(path)) = value else {
                continue;
            };

            let bytes = find_file(path, bind_paths, base_dir.as_deref())
                .ok_or_else(|| format!("file '{}' was not found", path.display()))
                .and_then(|found| {
                    std::fs::read(&found)
                        .map_err(|err| format!("failed to read '{}': {}", found.display(), err))
                });

            match bytes {
                Ok(bytes) => {
                    let key = format!("{}/{}", library.id, library.embedded_files.len());
                    library.embedded_files.insert(key.clone(), bytes);
                    *value = FieldValue::File(FileSource::Embedded(key));
                }
                Err(message) => messaging.write(
                    Diagnostic::error(Stage::Library, codes::LIBRARY_FILE_NOT_FOUND, message)
                        .at(location.clone()),
                ),
            }
        }
    }
}
