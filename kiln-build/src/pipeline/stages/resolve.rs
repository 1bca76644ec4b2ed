//! Resolve stage: apply localizations and locate referenced files.

use std::path::PathBuf;

use indexmap::IndexMap;
use kiln_core::codes;
use kiln_ir::{FieldValue, FileSource, Intermediate, Localization, RecordRef};
use tracing::debug;

use crate::{BindPath, Diagnostic, Messaging, Stage, files::find_file};

/// Codepage used when neither a localization nor the package declares one.
pub const DEFAULT_CODEPAGE: u32 = 1252;

const LOC_PREFIX: &str = "!(loc.";
pub(crate) const BIND_PREFIX: &str = "!(bind.";

pub struct ResolveContext {
    pub intermediate: Intermediate,
    /// Localizations from files, lowest precedence first.
    pub localizations: Vec<Localization>,
    /// Requested cultures; empty accepts every localization.
    pub cultures: Vec<String>,
    pub bind_paths: Vec<BindPath>,
}

/// A string field whose value depends on facts only known at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedField {
    pub record: RecordRef,
    pub field: String,
}

#[derive(Debug, Clone)]
pub struct ResolveResult {
    pub codepage: u32,
    pub delayed_fields: Vec<DelayedField>,
    /// Files on disk that bind will read.
    pub expected_embedded_files: Vec<PathBuf>,
    pub intermediate: Intermediate,
}

/// Resolve the linked intermediate.
///
/// Every problem is reported; `None` is returned when any was.
pub fn resolve(ctx: ResolveContext, messaging: &Messaging) -> Option<ResolveResult> {
    let errors_before = messaging.error_count();
    let mut intermediate = ctx.intermediate;

    // library localizations first so that supplied files override them
    let embedded = std::mem::take(&mut intermediate.localizations);
    let mut applied: Vec<Localization> = embedded
        .into_iter()
        .chain(ctx.localizations)
        .filter(|loc| loc.applies_to(&ctx.cultures))
        .collect();
    // stable: file order still decides within one culture
    applied.sort_by_key(|loc| culture_precedence(loc, &ctx.cultures));

    let mut strings: IndexMap<String, String> = IndexMap::new();
    for localization in &applied {
        strings.extend(localization.strings.clone());
    }

    let codepage = applied
        .iter()
        .rev()
        .find_map(|loc| loc.codepage)
        .or_else(|| package_codepage(&intermediate))
        .unwrap_or(DEFAULT_CODEPAGE);

    let mut delayed_fields = Vec::new();
    let mut expected_embedded_files = Vec::new();

    for record in &mut intermediate.records {
        let base_dir = record
            .source
            .as_ref()
            .and_then(|s| s.file.parent().map(|p| p.to_path_buf()));
        let location = record.location();
        let key = record.key();

        for (name, value) in record.fields.iter_mut() {
            match value {
                FieldValue::String(text) => {
                    match substitute_localizations(text, &strings) {
                        Ok(resolved) => *text = resolved,
                        Err(missing) => {
                            for variable in missing {
                                messaging.write(
                                    Diagnostic::error(
                                        Stage::Resolve,
                                        codes::UNRESOLVED_LOCALIZATION,
                                        format!(
                                            "localization variable '!(loc.{})' in field '{}' of {} has no value",
                                            variable, name, key
                                        ),
                                    )
                                    .at(location.clone()),
                                );
                            }
                            continue;
                        }
                    }
                    if text.contains(BIND_PREFIX) {
                        delayed_fields.push(DelayedField {
                            record: key.clone(),
                            field: name.clone(),
                        });
                    }
                }
                FieldValue::File(FileSource::Path(path)) => {
                    match find_file(path, &ctx.bind_paths, base_dir.as_deref()) {
                        Some(found) => {
                            expected_embedded_files.push(found.clone());
                            *path = found;
                        }
                        None => messaging.write(
                            Diagnostic::error(
                                Stage::Resolve,
                                codes::EMBEDDED_FILE_NOT_FOUND,
                                format!(
                                    "file '{}' referenced by {} was not found in any bind path",
                                    path.display(),
                                    key
                                ),
                            )
                            .at(location.clone()),
                        ),
                    }
                }
                FieldValue::File(FileSource::Embedded(embedded_key)) => {
                    if !intermediate.embedded_files.contains_key(embedded_key.as_str()) {
                        messaging.write(
                            Diagnostic::error(
                                Stage::Resolve,
                                codes::EMBEDDED_FILE_NOT_FOUND,
                                format!(
                                    "embedded file '{}' referenced by {} is missing from its library",
                                    embedded_key, key
                                ),
                            )
                            .at(location.clone()),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    if messaging.error_count() > errors_before {
        return None;
    }

    debug!(
        codepage,
        localizations = applied.len(),
        delayed = delayed_fields.len(),
        files = expected_embedded_files.len(),
        "resolved output"
    );

    Some(ResolveResult {
        codepage,
        delayed_fields,
        expected_embedded_files,
        intermediate,
    })
}

/// Rank of a localization among the requested cultures, lowest applied first.
///
/// Neutral localizations rank lowest, then the fallbacks from last to first,
/// so the primary culture is applied last and wins.
fn culture_precedence(localization: &Localization, cultures: &[String]) -> usize {
    let Some(culture) = &localization.culture else {
        return 0;
    };
    cultures
        .iter()
        .position(|c| c.eq_ignore_ascii_case(culture))
        .map_or(0, |index| cultures.len() - index)
}

fn package_codepage(intermediate: &Intermediate) -> Option<u32> {
    intermediate
        .records_of("Package")
        .find_map(|r| r.field("codepage").and_then(FieldValue::as_integer))
        .and_then(|cp| u32::try_from(cp).ok())
}

/// Replace `!(loc.Key)` and `!(loc.Key=default)` references.
///
/// Returns the names of every variable without a value.
fn substitute_localizations(
    text: &str,
    strings: &IndexMap<String, String>,
) -> Result<String, Vec<String>> {
    let mut out = String::with_capacity(text.len());
    let mut missing = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(LOC_PREFIX) {
        let after = &rest[start + LOC_PREFIX.len()..];
        let Some(end) = after.find(')') else {
            break;
        };
        out.push_str(&rest[..start]);

        let reference = &after[..end];
        let (name, default) = match reference.split_once('=') {
            Some((name, default)) => (name, Some(default)),
            None => (reference, None),
        };
        match strings.get(name).map(String::as_str).or(default) {
            Some(value) => out.push_str(value),
            None => missing.push(name.to_string()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    if missing.is_empty() {
        Ok(out)
    } else {
        Err(missing)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use kiln_ir::{IntermediateKind, Record, SourceLocation};
    use tempfile::TempDir;

    use super::*;

    fn localization(culture: Option<&str>, codepage: Option<u32>, strings: &[(&str, &str)]) -> Localization {
        Localization {
            culture: culture.map(String::from),
            codepage,
            location: None,
            strings: strings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn output(records: Vec<Record>) -> Intermediate {
        Intermediate::new("out", IntermediateKind::Output).with_records(records)
    }

    fn context(intermediate: Intermediate) -> ResolveContext {
        ResolveContext {
            intermediate,
            localizations: Vec::new(),
            cultures: Vec::new(),
            bind_paths: Vec::new(),
        }
    }

    fn title(text: &str) -> Record {
        Record::new("Feature", "Main").with_field("title", FieldValue::String(text.into()))
    }

    fn title_of(result: &ResolveResult) -> &str {
        result.intermediate.records[0]
            .field("title")
            .and_then(FieldValue::as_str)
            .unwrap()
    }

    #[test]
    fn test_substitution_and_defaults() {
        let strings: IndexMap<String, String> =
            [("Name".to_string(), "Widget".to_string())].into_iter().collect();

        assert_eq!(
            substitute_localizations("Install !(loc.Name) (!(loc.Edition=Home))", &strings),
            Ok("Install Widget (Home)".to_string())
        );
        assert_eq!(
            substitute_localizations("!(loc.Missing) and !(loc.Other)", &strings),
            Err(vec!["Missing".to_string(), "Other".to_string()])
        );
        assert_eq!(
            substitute_localizations("no references", &strings),
            Ok("no references".to_string())
        );
    }

    #[test]
    fn test_later_localizations_take_precedence() {
        let mut intermediate = output(vec![title("!(loc.Title)")]);
        intermediate
            .localizations
            .push(localization(None, None, &[("Title", "from library")]));
        let mut ctx = context(intermediate);
        ctx.localizations = vec![
            localization(None, Some(932), &[("Title", "first file")]),
            localization(None, None, &[("Title", "second file")]),
        ];

        let result = resolve(ctx, &Messaging::new()).unwrap();

        assert_eq!(title_of(&result), "second file");
        assert_eq!(result.codepage, 932);
        assert!(result.intermediate.localizations.is_empty());
    }

    #[test]
    fn test_culture_filter() {
        let mut ctx = context(output(vec![title("!(loc.Title)")]));
        ctx.cultures = vec!["de-de".into()];
        ctx.localizations = vec![
            localization(Some("de-de"), None, &[("Title", "Hallo")]),
            localization(Some("fr-fr"), None, &[("Title", "Bonjour")]),
        ];

        let result = resolve(ctx, &Messaging::new()).unwrap();
        assert_eq!(title_of(&result), "Hallo");
    }

    #[test]
    fn test_primary_culture_beats_fallbacks() {
        let mut ctx = context(output(vec![
            title("!(loc.Title)"),
            Record::new("Feature", "Docs").with_field("title", FieldValue::String("!(loc.Docs)".into())),
        ]));
        ctx.cultures = vec!["de-de".into(), "en-us".into()];
        ctx.localizations = vec![
            localization(Some("de-de"), Some(1252), &[("Title", "Hallo")]),
            localization(Some("en-us"), Some(437), &[("Title", "Hello"), ("Docs", "Manual")]),
            localization(None, None, &[("Title", "Neutral"), ("Docs", "Neutral docs")]),
        ];

        let result = resolve(ctx, &Messaging::new()).unwrap();

        assert_eq!(title_of(&result), "Hallo");
        // a string missing from the primary culture comes from the fallback
        assert_eq!(
            result.intermediate.records[1].field("title").and_then(FieldValue::as_str),
            Some("Manual")
        );
        assert_eq!(result.codepage, 1252);
    }

    #[test]
    fn test_codepage_fallbacks() {
        let package = Record::new("Package", "P").with_field("codepage", FieldValue::Integer(65001));
        let result = resolve(context(output(vec![package])), &Messaging::new()).unwrap();
        assert_eq!(result.codepage, 65001);

        let result = resolve(context(output(vec![])), &Messaging::new()).unwrap();
        assert_eq!(result.codepage, DEFAULT_CODEPAGE);
    }

    #[test]
    fn test_missing_localization_is_an_error() {
        let messaging = Messaging::new();
        let record = title("!(loc.Title)").at(SourceLocation::new("product.kiln", 5));

        assert!(resolve(context(output(vec![record])), &messaging).is_none());
        let diagnostic = &messaging.diagnostics()[0];
        assert_eq!(diagnostic.number, codes::UNRESOLVED_LOCALIZATION);
        assert_eq!(diagnostic.location.as_deref(), Some("product.kiln:5"));
    }

    #[test]
    fn test_bind_references_are_delayed() {
        let record = Record::new("Property", "AppSize")
            .with_field("value", FieldValue::String("!(bind.fileSize.App)".into()));

        let result = resolve(context(output(vec![record])), &Messaging::new()).unwrap();

        assert_eq!(
            result.delayed_fields,
            vec![DelayedField {
                record: RecordRef::new("Property", "AppSize"),
                field: "value".into(),
            }]
        );
    }

    #[test]
    fn test_files_are_located() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.exe"), b"MZ").unwrap();
        let file = Record::new("File", "App")
            .with_field("source", FieldValue::File(FileSource::Path("app.exe".into())))
            .at(SourceLocation::new(temp.path().join("product.kiln"), 3));
        let missing = Record::new("File", "Gone")
            .with_field("source", FieldValue::File(FileSource::Path("gone.exe".into())));

        let result = resolve(context(output(vec![file.clone()])), &Messaging::new()).unwrap();
        assert_eq!(result.expected_embedded_files, vec![temp.path().join("app.exe")]);
        assert_eq!(
            result.intermediate.records[0].field("source").and_then(FieldValue::as_path),
            Some(temp.path().join("app.exe").as_path())
        );

        let messaging = Messaging::new();
        assert!(resolve(context(output(vec![file, missing])), &messaging).is_none());
        assert_eq!(messaging.error_count(), 1);
        assert_eq!(messaging.last_error_number(), codes::EMBEDDED_FILE_NOT_FOUND);
    }
}
