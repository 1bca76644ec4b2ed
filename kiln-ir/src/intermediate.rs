use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Localization, Record};

/// What produced an intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntermediateKind {
    /// Compiled from one source unit.
    Source,
    /// Combined by the librarian for later linking.
    Library,
    /// Fully linked output.
    Output,
}

/// The compiled or linked representation of one or more source units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intermediate {
    /// Unique identity, fresh per compile/library/link event.
    pub id: String,
    pub kind: IntermediateKind,
    pub records: Vec<Record>,
    /// Unresolved localizations carried by libraries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub localizations: Vec<Localization>,
    /// Files embedded into the container, keyed by `<library-id>/<n>`.
    ///
    /// Stored outside the JSON payload of a container.
    #[serde(skip)]
    pub embedded_files: IndexMap<String, Vec<u8>>,
}

impl Intermediate {
    pub fn new(id: impl Into<String>, kind: IntermediateKind) -> Self {
        Self {
            id: id.into(),
            kind,
            records: Vec::new(),
            localizations: Vec::new(),
            embedded_files: IndexMap::new(),
        }
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    /// Iterate records of one kind.
    pub fn records_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Record> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    pub fn find(&self, kind: &str, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.kind == kind && r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_of_and_find() {
        let intermediate = Intermediate::new("abc", IntermediateKind::Source).with_records(vec![
            Record::new("Property", "A"),
            Record::new("Feature", "Main"),
            Record::new("Property", "B"),
        ]);

        let ids: Vec<_> = intermediate
            .records_of("Property")
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(intermediate.find("Feature", "Main").is_some());
        assert!(intermediate.find("Feature", "Other").is_none());
    }
}
