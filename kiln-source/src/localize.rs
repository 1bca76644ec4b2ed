use std::path::Path;

use indexmap::IndexMap;
use kiln_ir::Localization;
use miette::{NamedSource, SourceSpan};
use serde::Deserialize;

use crate::{Document, Error, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocalizationFile {
    culture: Option<String>,
    codepage: Option<u32>,
    #[serde(default)]
    strings: IndexMap<String, String>,
}

/// Parse a localization file.
pub fn parse_localization_file(path: impl AsRef<Path>) -> Result<Localization> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| {
        Box::new(Error::Io {
            path: path.to_path_buf(),
            source,
        })
    })?;
    let mut localization = parse_localization_str(&content, &path.display().to_string())?;
    localization.location = Some(path.to_path_buf());
    Ok(localization)
}

/// Parse localization content. `filename` is used in error reports.
pub fn parse_localization_str(content: &str, filename: &str) -> Result<Localization> {
    let file: LocalizationFile = toml::from_str(content).map_err(|source| {
        let span = source.span();
        let location = span
            .clone()
            .map(|s| Document::new(filename, content).location_at(s.start));
        Box::new(Error::Localization {
            src: NamedSource::new(filename, content.to_string()),
            span: span.map(SourceSpan::from),
            location,
            source,
        })
    })?;

    Ok(Localization {
        culture: file.culture.filter(|c| !c.is_empty()),
        codepage: file.codepage,
        location: None,
        strings: file.strings,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_localization() {
        let localization = parse_localization_str(
            r#"
culture = "en-us"
codepage = 1252

[strings]
ProductName = "Widget"
Welcome = "Welcome to Widget"
"#,
            "en-us.kloc",
        )
        .unwrap();

        assert_eq!(localization.culture.as_deref(), Some("en-us"));
        assert_eq!(localization.codepage, Some(1252));
        let keys: Vec<_> = localization.strings.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ProductName", "Welcome"]);
    }

    #[test]
    fn test_neutral_localization() {
        let localization =
            parse_localization_str("[strings]\nA = \"a\"\n", "neutral.kloc").unwrap();
        assert!(localization.culture.is_none());
        assert!(localization.codepage.is_none());
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = parse_localization_str("culture = \"en-us\"\n[strings\n", "bad.kloc").unwrap_err();

        assert!(matches!(*err, Error::Localization { .. }));
        assert_eq!(err.number(), kiln_core::codes::LOCALIZATION_PARSE);
        assert_eq!(err.location().unwrap().file, Path::new("bad.kloc"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = parse_localization_str("language = \"en\"\n", "bad.kloc").unwrap_err();
        assert!(matches!(*err, Error::Localization { .. }));
    }

    #[test]
    fn test_parse_file_records_location() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("de-de.kloc");
        std::fs::write(&path, "culture = \"de-de\"\n[strings]\nA = \"b\"\n").unwrap();

        let localization = parse_localization_file(&path).unwrap();
        assert_eq!(localization.location.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_localization_file("/nonexistent/en-us.kloc").unwrap_err();
        assert!(matches!(*err, Error::Io { .. }));
    }
}
