//! Typed records, the semantic content of an intermediate.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Where a record was declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A reference from one record to another, by kind and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: String,
    pub id: String,
}

impl RecordRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Parse the `@Kind:Id` reference syntax.
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, id) = s.strip_prefix('@')?.split_once(':')?;
        if kind.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::new(kind, id))
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Where the bytes of a referenced file come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSource {
    /// A path on disk, possibly relative to a bind path.
    Path(PathBuf),
    /// A file embedded in an intermediate container, by key.
    Embedded(String),
}

/// The value of a single record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Bool(bool),
    File(FileSource),
    Ref(RecordRef),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            FieldValue::File(FileSource::Path(p)) => Some(p),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Integer(_) => "integer",
            FieldValue::Bool(_) => "bool",
            FieldValue::File(_) => "file",
            FieldValue::Ref(_) => "reference",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::File(FileSource::Path(p)) => write!(f, "{}", p.display()),
            FieldValue::File(FileSource::Embedded(key)) => write!(f, "embedded:{}", key),
            FieldValue::Ref(r) => write!(f, "@{}", r),
        }
    }
}

/// A typed record: one row of semantic content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub kind: String,
    pub id: String,
    pub fields: IndexMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLocation>,
}

impl Record {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            fields: IndexMap::new(),
            source: None,
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn at(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The key other records use to reference this one.
    pub fn key(&self) -> RecordRef {
        RecordRef::new(&self.kind, &self.id)
    }

    /// All references held by this record, with the field holding them.
    pub fn references(&self) -> impl Iterator<Item = (&str, &RecordRef)> {
        self.fields.iter().filter_map(|(name, value)| match value {
            FieldValue::Ref(r) => Some((name.as_str(), r)),
            _ => None,
        })
    }

    /// Human-readable location, or `<unknown>`.
    pub fn location(&self) -> String {
        self.source
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<unknown>".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ref_parse() {
        assert_eq!(
            RecordRef::parse("@Component:Main"),
            Some(RecordRef::new("Component", "Main"))
        );
        assert_eq!(RecordRef::parse("Component:Main"), None);
        assert_eq!(RecordRef::parse("@Component"), None);
        assert_eq!(RecordRef::parse("@:Main"), None);
    }

    #[test]
    fn test_record_references() {
        let record = Record::new("File", "App")
            .with_field("component", FieldValue::Ref(RecordRef::new("Component", "C1")))
            .with_field("name", FieldValue::String("app.exe".into()));

        let refs: Vec<_> = record.references().collect();
        assert_eq!(refs, vec![("component", &RecordRef::new("Component", "C1"))]);
        assert_eq!(record.key().to_string(), "File:App");
    }

    #[test]
    fn test_record_location() {
        let record = Record::new("Property", "P");
        assert_eq!(record.location(), "<unknown>");

        let record = record.at(SourceLocation::new("product.kiln", 4));
        assert_eq!(record.location(), "product.kiln:4");
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Integer(42).to_string(), "42");
        assert_eq!(
            FieldValue::Ref(RecordRef::new("Feature", "Main")).to_string(),
            "@Feature:Main"
        );
        assert_eq!(
            FieldValue::File(FileSource::Embedded("lib/0".into())).to_string(),
            "embedded:lib/0"
        );
    }
}
