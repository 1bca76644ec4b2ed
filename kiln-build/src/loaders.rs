//! Loading of library containers and localization files.
//!
//! A file that fails to load is reported and skipped; the caller decides
//! whether the recorded error stops the build.

use std::path::PathBuf;

use kiln_ir::{Intermediate, Localization, RecordDefinitions};
use kiln_source::parse_localization_file;
use tracing::debug;

use crate::{Diagnostic, Messaging, Stage, pipeline::describe};

/// Load library containers, in input order.
pub fn load_libraries(
    paths: &[PathBuf],
    definitions: &RecordDefinitions,
    messaging: &Messaging,
) -> Vec<Intermediate> {
    paths
        .iter()
        .filter_map(|path| match Intermediate::load(path, definitions) {
            Ok(library) => {
                debug!(path = %path.display(), id = %library.id, "loaded library");
                Some(library)
            }
            Err(err) => {
                messaging.write(
                    Diagnostic::error(
                        Stage::Link,
                        err.number(),
                        format!("failed to load library: {}", describe(&err)),
                    )
                    .at(path.display().to_string()),
                );
                None
            }
        })
        .collect()
}

/// Parse localization files, in input order.
pub fn load_localizations(paths: &[PathBuf], messaging: &Messaging) -> Vec<Localization> {
    paths
        .iter()
        .filter_map(|path| match parse_localization_file(path) {
            Ok(localization) => Some(localization),
            Err(err) => {
                let location = err
                    .location()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| path.display().to_string());
                messaging.write(
                    Diagnostic::error(Stage::Localize, err.number(), describe(err.as_ref()))
                        .at(location),
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use kiln_core::codes;
    use kiln_ir::{IntermediateKind, Record};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_corrupt_library_is_reported_and_skipped() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good.kilnlib");
        let bad = temp.path().join("bad.kilnlib");
        Intermediate::new("lib", IntermediateKind::Library)
            .with_records(vec![Record::new("Feature", "Main")])
            .save(&good)
            .unwrap();
        fs::write(&bad, b"definitely not a container").unwrap();
        let messaging = Messaging::new();

        let libraries = load_libraries(
            &[bad.clone(), good],
            &RecordDefinitions::builtin(),
            &messaging,
        );

        assert_eq!(libraries.len(), 1);
        assert_eq!(libraries[0].id, "lib");
        let diagnostics = messaging.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].number, codes::CORRUPT_CONTAINER);
        assert_eq!(diagnostics[0].location, Some(bad.display().to_string()));
    }

    #[test]
    fn test_missing_library() {
        let temp = TempDir::new().unwrap();
        let messaging = Messaging::new();

        let libraries = load_libraries(
            &[temp.path().join("missing.kilnlib")],
            &RecordDefinitions::builtin(),
            &messaging,
        );

        assert!(libraries.is_empty());
        assert_eq!(messaging.last_error_number(), codes::CONTAINER_IO);
    }

    #[test]
    fn test_localizations_keep_order() {
        let temp = TempDir::new().unwrap();
        let en = temp.path().join("en.kilnloc");
        let de = temp.path().join("de.kilnloc");
        fs::write(&en, "culture = \"en-us\"\n[strings]\nTitle = \"Hello\"\n").unwrap();
        fs::write(&de, "culture = \"de-de\"\ncodepage = 1252\n").unwrap();

        let localizations = load_localizations(&[en, de], &Messaging::new());

        let cultures: Vec<_> = localizations.iter().map(|l| l.culture.as_deref()).collect();
        assert_eq!(cultures, vec![Some("en-us"), Some("de-de")]);
    }

    #[test]
    fn test_malformed_localization_has_location() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.kilnloc");
        fs::write(&path, "culture = \"en-us\"\nstrings = 5\n").unwrap();
        let messaging = Messaging::new();

        assert!(load_localizations(&[path], &messaging).is_empty());
        let diagnostic = &messaging.diagnostics()[0];
        assert_eq!(diagnostic.number, codes::LOCALIZATION_PARSE);
        assert_eq!(diagnostic.stage, Stage::Localize);
        assert!(diagnostic.location.as_deref().unwrap().ends_with("broken.kilnloc:2"));
    }
}
