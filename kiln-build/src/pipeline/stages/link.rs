//! Link stage: merge units and libraries, resolve references between them.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use kiln_core::{codes, new_identity};
use kiln_ir::{Intermediate, IntermediateKind, Record, RecordRef};
use tracing::debug;

use crate::{
    Diagnostic, LinkerExtension, Messaging, Stage, pipeline::extension::check_hook,
};

/// The record kind every linked output must contain exactly once.
pub const ENTRY_KIND: &str = "Package";

pub struct LinkContext {
    /// Freshly compiled units, in input order.
    pub intermediates: Vec<Intermediate>,
    /// Successfully loaded libraries, in input order.
    pub libraries: Vec<Intermediate>,
    pub extensions: Vec<Arc<dyn LinkerExtension>>,
}

/// Link every unit and library into one output intermediate.
///
/// Returns `None` when a conflict or unresolved reference was reported.
pub fn link(ctx: LinkContext, messaging: &Messaging) -> Option<Intermediate> {
    let errors_before = messaging.error_count();

    let mut identities = HashSet::new();
    let mut output = Intermediate::new(new_identity(), IntermediateKind::Output);

    for unit in ctx.intermediates.into_iter().chain(ctx.libraries) {
        if !identities.insert(unit.id.clone()) {
            messaging.warning(
                Stage::Link,
                format!("intermediate '{}' was supplied more than once; skipping", unit.id),
            );
            continue;
        }
        output.records.extend(unit.records);
        output.localizations.extend(unit.localizations);
        output.embedded_files.extend(unit.embedded_files);
    }

    let symbols = symbol_table(&output.records, messaging);
    check_entry_section(&output.records, messaging);
    check_references(&output.records, &symbols, messaging);

    if messaging.error_count() > errors_before {
        return None;
    }

    for extension in &ctx.extensions {
        let result = extension.on_linked(&mut output);
        if !check_hook(messaging, Stage::Link, extension.name(), result) {
            return None;
        }
    }

    debug!(
        id = %output.id,
        records = output.records.len(),
        "linked output"
    );
    Some(output)
}

fn symbol_table<'a>(records: &'a [Record], messaging: &Messaging) -> HashMap<RecordRef, &'a Record> {
    let mut symbols: HashMap<RecordRef, &Record> = HashMap::new();
    for record in records {
        if let Some(existing) = symbols.get(&record.key()) {
            messaging.write(
                Diagnostic::error(
                    Stage::Link,
                    codes::DUPLICATE_SYMBOL,
                    format!(
                        "duplicate {} '{}' conflicts with the one at {}",
                        record.kind,
                        record.id,
                        existing.location()
                    ),
                )
                .at(record.location()),
            );
            continue;
        }
        symbols.insert(record.key(), record);
    }
    symbols
}

fn check_entry_section(records: &[Record], messaging: &Messaging) {
    let entries: Vec<&Record> = records.iter().filter(|r| r.kind == ENTRY_KIND).collect();
    match entries.as_slice() {
        [] => messaging.error(
            Stage::Link,
            codes::MISSING_ENTRY_SECTION,
            format!("no {} record was found; the output needs exactly one", ENTRY_KIND),
        ),
        [_] => {}
        [first, rest @ ..] => {
            for entry in rest {
                messaging.write(
                    Diagnostic::error(
                        Stage::Link,
                        codes::MULTIPLE_ENTRY_SECTIONS,
                        format!(
                            "{} '{}' conflicts with {} '{}' at {}; the output needs exactly one",
                            ENTRY_KIND,
                            entry.id,
                            ENTRY_KIND,
                            first.id,
                            first.location()
                        ),
                    )
                    .at(entry.location()),
                );
            }
        }
    }
}

fn check_references(
    records: &[Record],
    symbols: &HashMap<RecordRef, &Record>,
    messaging: &Messaging,
) {
    for record in records {
        for (field, reference) in record.references() {
            if !symbols.contains_key(reference) {
                messaging.write(
                    Diagnostic::error(
                        Stage::Link,
                        codes::UNRESOLVED_REFERENCE,
                        format!(
                            "unresolved reference to {} in field '{}' of {} '{}'",
                            reference, field, record.kind, record.id
                        ),
                    )
                    .at(record.location()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use kiln_ir::{FieldValue, Localization, SourceLocation};

    use super::*;

    fn package() -> Record {
        Record::new("Package", "Widget")
            .with_field("name", FieldValue::String("Widget".into()))
            .with_field("version", FieldValue::String("1.0.0".into()))
            .at(SourceLocation::new("product.kiln", 1))
    }

    fn component(id: &str, directory: &str) -> Record {
        Record::new("Component", id)
            .with_field("directory", FieldValue::Ref(RecordRef::new("Directory", directory)))
            .at(SourceLocation::new("components.kiln", 4))
    }

    fn directory(id: &str) -> Record {
        Record::new("Directory", id).with_field("name", FieldValue::String(id.into()))
    }

    fn unit(kind: IntermediateKind, records: Vec<Record>) -> Intermediate {
        Intermediate::new(new_identity(), kind).with_records(records)
    }

    fn context(intermediates: Vec<Intermediate>, libraries: Vec<Intermediate>) -> LinkContext {
        LinkContext {
            intermediates,
            libraries,
            extensions: Vec::new(),
        }
    }

    #[test]
    fn test_links_across_units_and_libraries() {
        let mut library = unit(IntermediateKind::Library, vec![directory("Install")]);
        library.localizations.push(Localization::default());
        library.embedded_files.insert("lib/0".into(), vec![1]);
        let ctx = context(
            vec![unit(IntermediateKind::Source, vec![package(), component("Main", "Install")])],
            vec![library],
        );
        let messaging = Messaging::new();

        let output = link(ctx, &messaging).unwrap();

        assert!(!messaging.encountered_error());
        assert_eq!(output.kind, IntermediateKind::Output);
        assert_eq!(output.records.len(), 3);
        assert_eq!(output.localizations.len(), 1);
        assert!(output.embedded_files.contains_key("lib/0"));
    }

    #[test]
    fn test_unresolved_reference() {
        let ctx = context(
            vec![unit(IntermediateKind::Source, vec![package(), component("Main", "Nowhere")])],
            vec![],
        );
        let messaging = Messaging::new();

        assert!(link(ctx, &messaging).is_none());
        let diagnostic = &messaging.diagnostics()[0];
        assert_eq!(diagnostic.number, codes::UNRESOLVED_REFERENCE);
        insta::assert_snapshot!(
            diagnostic,
            @"error[KILN0311]: unresolved reference to Directory:Nowhere in field 'directory' of Component 'Main' (at components.kiln:4)"
        );
    }

    #[test]
    fn test_duplicate_symbol_names_both_locations() {
        let ctx = context(
            vec![
                unit(IntermediateKind::Source, vec![package(), directory("Install")]),
                unit(
                    IntermediateKind::Source,
                    vec![directory("Install").at(SourceLocation::new("other.kiln", 7))],
                ),
            ],
            vec![],
        );
        let messaging = Messaging::new();

        assert!(link(ctx, &messaging).is_none());
        let diagnostic = &messaging.diagnostics()[0];
        assert_eq!(diagnostic.number, codes::DUPLICATE_SYMBOL);
        assert_eq!(diagnostic.location.as_deref(), Some("other.kiln:7"));
        assert!(diagnostic.message.contains("<unknown>"));
    }

    #[test]
    fn test_entry_section_required_once() {
        let messaging = Messaging::new();
        let ctx = context(vec![unit(IntermediateKind::Source, vec![directory("A")])], vec![]);
        assert!(link(ctx, &messaging).is_none());
        assert_eq!(messaging.last_error_number(), codes::MISSING_ENTRY_SECTION);

        let messaging = Messaging::new();
        let second = Record::new("Package", "Other")
            .with_field("name", FieldValue::String("Other".into()))
            .with_field("version", FieldValue::String("2.0.0".into()));
        let ctx = context(vec![unit(IntermediateKind::Source, vec![package(), second])], vec![]);
        assert!(link(ctx, &messaging).is_none());
        assert_eq!(messaging.last_error_number(), codes::MULTIPLE_ENTRY_SECTIONS);
    }

    #[test]
    fn test_repeated_library_is_skipped_with_warning() {
        let library = unit(IntermediateKind::Library, vec![directory("Install")]);
        let ctx = context(
            vec![unit(IntermediateKind::Source, vec![package()])],
            vec![library.clone(), library],
        );
        let messaging = Messaging::new();

        let output = link(ctx, &messaging).unwrap();

        assert_eq!(output.records.len(), 2);
        assert_eq!(messaging.warning_count(), 1);
    }

    struct AddFeature;

    impl LinkerExtension for AddFeature {
        fn name(&self) -> &'static str {
            "add-feature"
        }

        fn on_linked(&self, output: &mut Intermediate) -> eyre::Result<()> {
            output.records.push(Record::new("Feature", "Complete"));
            Ok(())
        }
    }

    #[test]
    fn test_linker_extensions_run_after_link() {
        let mut ctx = context(vec![unit(IntermediateKind::Source, vec![package()])], vec![]);
        ctx.extensions.push(Arc::new(AddFeature));

        let output = link(ctx, &Messaging::new()).unwrap();

        assert!(output.find("Feature", "Complete").is_some());
    }
}
