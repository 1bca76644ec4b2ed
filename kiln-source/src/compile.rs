//! Compiler: preprocessed document → typed records.
//!
//! A document is TOML where every top-level array of tables names a record
//! kind:
//!
//! ```toml
//! [[File]]
//! id = "AppExe"
//! component = "@Component:Main"
//! source = "bin/app.exe"
//! ```

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use indexmap::IndexMap;
use kiln_core::Platform;
use kiln_ir::{
    FieldKind, FieldValue, FileSource, Intermediate, IntermediateKind, Record, RecordDefinition,
    RecordDefinitions, RecordRef,
};
use miette::SourceSpan;
use toml::Spanned;
use tracing::debug;

use crate::{CompileErrors, CompilerExtension, Document, Error};

type RawTable = IndexMap<String, Spanned<toml::Value>>;
type RawDocument = IndexMap<String, Vec<Spanned<RawTable>>>;

/// Everything the compiler needs for one document.
#[derive(Clone, Default)]
pub struct CompileContext {
    /// Identity given to the compiled intermediate.
    pub compilation_id: String,
    pub platform: Platform,
    /// Every known record kind, including those contributed by extensions.
    pub definitions: RecordDefinitions,
    pub extensions: Vec<Arc<dyn CompilerExtension>>,
}

/// Compile a preprocessed document into an intermediate.
///
/// All semantic errors in the document are reported together.
pub fn compile(
    ctx: &CompileContext,
    document: &Document,
) -> std::result::Result<Intermediate, CompileErrors> {
    let raw: RawDocument = toml::from_str(&document.text).map_err(|source| {
        let span = source.span();
        Box::new(Error::Syntax {
            src: document.named_source(),
            span: span.clone().map(SourceSpan::from),
            location: span.map(|s| document.location_at(s.start)),
            source,
        })
    })?;

    let mut compiler = Compiler {
        ctx,
        document,
        seen: HashSet::new(),
        records: Vec::new(),
        errors: Vec::new(),
    };

    for (kind, tables) in raw {
        compiler.compile_kind(&kind, tables);
    }

    if !compiler.errors.is_empty() {
        return Err(CompileErrors {
            errors: compiler.errors,
        });
    }

    debug!(
        file = %document.path.display(),
        records = compiler.records.len(),
        "compiled document"
    );

    Ok(Intermediate::new(&ctx.compilation_id, IntermediateKind::Source)
        .with_records(compiler.records))
}

struct Compiler<'a> {
    ctx: &'a CompileContext,
    document: &'a Document,
    seen: HashSet<(String, String)>,
    records: Vec<Record>,
    errors: Vec<Error>,
}

impl Compiler<'_> {
    fn compile_kind(&mut self, kind: &str, tables: Vec<Spanned<RawTable>>) {
        let Some(definition) = self.ctx.definitions.get(kind) else {
            let start = tables.first().map(|t| t.span().start).unwrap_or_default();
            self.errors.push(Error::UnknownRecordKind {
                src: self.document.named_source(),
                span: SourceSpan::from((start, 0)),
                location: self.document.location_at(start),
                kind: kind.to_string(),
            });
            return;
        };

        for table in tables {
            let span = table.span();
            let table = table.into_inner();
            if let Some(record) = self.compile_record(definition, span, table) {
                self.records.push(record);
            }
        }
    }

    fn compile_record(
        &mut self,
        definition: &RecordDefinition,
        span: std::ops::Range<usize>,
        mut table: RawTable,
    ) -> Option<Record> {
        let kind = definition.name.as_str();
        let record_span = SourceSpan::from(span.start..span.start);
        let location = self.document.location_at(span.start);

        let id = match table.shift_remove("id") {
            Some(value) => match value.get_ref() {
                toml::Value::String(id) => id.clone(),
                other => {
                    self.invalid_value("id", "string", other.type_str(), value.span());
                    return None;
                }
            },
            None => {
                self.errors.push(Error::MissingField {
                    src: self.document.named_source(),
                    span: record_span,
                    location,
                    kind: kind.to_string(),
                    id: "<unnamed>".to_string(),
                    field: "id".to_string(),
                });
                return None;
            }
        };

        if !self.seen.insert((kind.to_string(), id.clone())) {
            self.errors.push(Error::DuplicateRecord {
                src: self.document.named_source(),
                span: record_span,
                location,
                kind: kind.to_string(),
                id,
            });
            return None;
        }

        let mut record = Record::new(kind, &id).at(location.clone());
        let mut valid = true;

        for (name, value) in table {
            let Some(field) = definition.get_field(&name) else {
                self.errors.push(Error::UnknownField {
                    src: self.document.named_source(),
                    span: value.span().into(),
                    location: self.document.location_at(value.span().start),
                    kind: kind.to_string(),
                    id: id.clone(),
                    field: name,
                });
                valid = false;
                continue;
            };

            match convert(value.get_ref(), &field.kind) {
                Some(converted) => {
                    record.fields.insert(name, converted);
                }
                None => {
                    self.invalid_value(
                        &name,
                        &field.kind.describe(),
                        value.get_ref().type_str(),
                        value.span(),
                    );
                    valid = false;
                }
            }
        }

        for field in definition.fields.iter().filter(|f| f.required) {
            if !record.fields.contains_key(&field.name) {
                self.errors.push(Error::MissingField {
                    src: self.document.named_source(),
                    span: record_span,
                    location: location.clone(),
                    kind: kind.to_string(),
                    id: id.clone(),
                    field: field.name.clone(),
                });
                valid = false;
            }
        }

        if !valid {
            return None;
        }

        for extension in &self.ctx.extensions {
            if let Err(message) = extension.validate(&record) {
                self.errors.push(Error::Validation {
                    src: self.document.named_source(),
                    span: record_span,
                    location: location.clone(),
                    extension: extension.name().to_string(),
                    message,
                });
                valid = false;
            }
        }

        valid.then_some(record)
    }

    fn invalid_value(
        &mut self,
        field: &str,
        expected: &str,
        found: &str,
        span: std::ops::Range<usize>,
    ) {
        self.errors.push(Error::InvalidFieldValue {
            src: self.document.named_source(),
            location: self.document.location_at(span.start),
            span: span.into(),
            field: field.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
}

/// Convert a TOML value to a field value of the given kind.
fn convert(value: &toml::Value, kind: &FieldKind) -> Option<FieldValue> {
    match (kind, value) {
        (FieldKind::String, toml::Value::String(s)) => Some(FieldValue::String(s.clone())),
        (FieldKind::Integer, toml::Value::Integer(i)) => Some(FieldValue::Integer(*i)),
        (FieldKind::Bool, toml::Value::Boolean(b)) => Some(FieldValue::Bool(*b)),
        (FieldKind::File, toml::Value::String(s)) => {
            Some(FieldValue::File(FileSource::Path(PathBuf::from(s))))
        }
        (FieldKind::Ref(target), toml::Value::String(s)) => {
            // a bare identifier refers to the field's target kind
            let reference = RecordRef::parse(s).unwrap_or_else(|| RecordRef::new(target, s));
            (&reference.kind == target).then_some(FieldValue::Ref(reference))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use kiln_ir::FieldKind;

    use super::*;

    fn context() -> CompileContext {
        CompileContext {
            compilation_id: "unit-1".into(),
            definitions: RecordDefinitions::builtin(),
            ..Default::default()
        }
    }

    fn compile_str(ctx: &CompileContext, text: &str) -> Result<Intermediate, CompileErrors> {
        compile(ctx, &Document::new("product.kiln", text))
    }

    #[test]
    fn test_compile_records() {
        let intermediate = compile_str(
            &context(),
            r#"
[[Directory]]
id = "Install"
name = "Widget"

[[Component]]
id = "Main"
directory = "Install"

[[File]]
id = "App"
component = "@Component:Main"
source = "bin/app.exe"
"#,
        )
        .unwrap();

        assert_eq!(intermediate.id, "unit-1");
        assert_eq!(intermediate.kind, IntermediateKind::Source);
        assert_eq!(intermediate.records.len(), 3);

        let component = intermediate.find("Component", "Main").unwrap();
        assert_eq!(
            component.field("directory"),
            Some(&FieldValue::Ref(RecordRef::new("Directory", "Install")))
        );
        assert_eq!(component.source.as_ref().unwrap().line, 6);

        let file = intermediate.find("File", "App").unwrap();
        assert_eq!(
            file.field("source").and_then(FieldValue::as_path),
            Some(std::path::Path::new("bin/app.exe"))
        );
    }

    #[test]
    fn test_syntax_error_has_location() {
        let errors = compile_str(&context(), "[[Property]]\nid = \"A\"\nvalue = \n").unwrap_err();

        assert_eq!(errors.errors.len(), 1);
        let error = &errors.errors[0];
        assert!(matches!(error, Error::Syntax { .. }));
        assert_eq!(error.number(), kiln_core::codes::SYNTAX_ERROR);
        assert!(error.location().is_some());
    }

    #[test]
    fn test_semantic_errors_are_collected() {
        let errors = compile_str(
            &context(),
            r#"
[[Property]]
id = "A"

[[Property]]
id = "B"
value = 7

[[Property]]
id = "C"
value = "x"
color = "red"

[[Gadget]]
id = "G"
"#,
        )
        .unwrap_err();

        let numbers: Vec<i32> = errors.errors.iter().map(Error::number).collect();
        assert_eq!(
            numbers,
            vec![
                kiln_core::codes::MISSING_FIELD,
                kiln_core::codes::INVALID_FIELD_VALUE,
                kiln_core::codes::UNKNOWN_FIELD,
                kiln_core::codes::UNKNOWN_RECORD_KIND,
            ]
        );
    }

    #[test]
    fn test_duplicate_record_in_unit() {
        let errors = compile_str(
            &context(),
            "[[Property]]\nid = \"A\"\nvalue = \"1\"\n\n[[Property]]\nid = \"A\"\nvalue = \"2\"\n",
        )
        .unwrap_err();

        assert!(matches!(errors.errors[0], Error::DuplicateRecord { .. }));
    }

    #[test]
    fn test_reference_to_wrong_kind_is_invalid() {
        let errors = compile_str(
            &context(),
            "[[Component]]\nid = \"C\"\ndirectory = \"@Feature:Main\"\n",
        )
        .unwrap_err();

        assert!(matches!(errors.errors[0], Error::InvalidFieldValue { .. }));
    }

    struct ShortcutExtension;

    impl CompilerExtension for ShortcutExtension {
        fn name(&self) -> &'static str {
            "shortcuts"
        }

        fn definitions(&self) -> Vec<RecordDefinition> {
            vec![RecordDefinition::new("Shortcut").required("target", FieldKind::String)]
        }

        fn validate(&self, record: &Record) -> Result<(), String> {
            match record.field("target").and_then(FieldValue::as_str) {
                Some(target) if target.is_empty() => Err("shortcut target is empty".into()),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_extension_definitions_and_validation() {
        let extension = ShortcutExtension;
        let mut ctx = context();
        for definition in extension.definitions() {
            ctx.definitions.register(definition);
        }
        ctx.extensions.push(Arc::new(extension));

        let ok = compile_str(&ctx, "[[Shortcut]]\nid = \"S\"\ntarget = \"app.exe\"\n").unwrap();
        assert_eq!(ok.records.len(), 1);

        let errors = compile_str(&ctx, "[[Shortcut]]\nid = \"S\"\ntarget = \"\"\n").unwrap_err();
        assert_eq!(
            errors.errors[0].to_string(),
            "shortcuts: shortcut target is empty"
        );
    }

    #[test]
    fn test_empty_document_compiles() {
        let intermediate = compile_str(&context(), "").unwrap();
        assert!(intermediate.records.is_empty());
    }
}
