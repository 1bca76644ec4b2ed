//! Record definitions: the schema every record is validated against.

use indexmap::IndexMap;

use crate::FieldValue;

/// The type a field's value must have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Bool,
    /// A path to a file that is embedded into the output.
    File,
    /// A reference to a record of the named kind.
    Ref(String),
}

impl FieldKind {
    /// Whether `value` is acceptable for a field of this kind.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (FieldKind::String, FieldValue::String(_))
            | (FieldKind::Integer, FieldValue::Integer(_))
            | (FieldKind::Bool, FieldValue::Bool(_))
            | (FieldKind::File, FieldValue::File(_)) => true,
            (FieldKind::Ref(kind), FieldValue::Ref(r)) => &r.kind == kind,
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FieldKind::String => "string".into(),
            FieldKind::Integer => "integer".into(),
            FieldKind::Bool => "bool".into(),
            FieldKind::File => "file path".into(),
            FieldKind::Ref(kind) => format!("reference to {}", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// The schema of one record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl RecordDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add an optional field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDefinition {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    /// Add a required field.
    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDefinition {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Registry of known record kinds.
#[derive(Debug, Clone, Default)]
pub struct RecordDefinitions {
    definitions: IndexMap<String, RecordDefinition>,
}

impl RecordDefinitions {
    /// Create a registry with no definitions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in record kinds.
    pub fn builtin() -> Self {
        let mut defs = Self::empty();
        defs.register(
            RecordDefinition::new("Package")
                .required("name", FieldKind::String)
                .required("version", FieldKind::String)
                .field("manufacturer", FieldKind::String)
                .field("upgrade_code", FieldKind::String)
                .field("codepage", FieldKind::Integer)
                .field("compressed", FieldKind::Bool),
        );
        defs.register(
            RecordDefinition::new("Directory")
                .required("name", FieldKind::String)
                .field("parent", FieldKind::Ref("Directory".into())),
        );
        defs.register(
            RecordDefinition::new("Component")
                .required("directory", FieldKind::Ref("Directory".into()))
                .field("guid", FieldKind::String),
        );
        defs.register(
            RecordDefinition::new("File")
                .required("component", FieldKind::Ref("Component".into()))
                .required("source", FieldKind::File)
                .field("name", FieldKind::String),
        );
        defs.register(
            RecordDefinition::new("Feature")
                .field("title", FieldKind::String)
                .field("level", FieldKind::Integer)
                .field("parent", FieldKind::Ref("Feature".into())),
        );
        defs.register(
            RecordDefinition::new("FeatureComponent")
                .required("feature", FieldKind::Ref("Feature".into()))
                .required("component", FieldKind::Ref("Component".into())),
        );
        defs.register(RecordDefinition::new("Property").required("value", FieldKind::String));
        defs
    }

    /// Register a definition, replacing any existing one of the same name.
    pub fn register(&mut self, definition: RecordDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, kind: &str) -> Option<&RecordDefinition> {
        self.definitions.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.definitions.contains_key(kind)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}
