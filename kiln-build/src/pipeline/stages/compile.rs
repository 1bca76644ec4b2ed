//! Compile stage: source units → compiled intermediates.

use std::path::PathBuf;

use indexmap::IndexMap;
use kiln_core::{Platform, new_identity};
use kiln_ir::{Intermediate, RecordDefinitions};
use kiln_source::{CompileContext, PreprocessContext, compile, preprocess};
use tracing::debug;

use crate::{
    Diagnostic, Extensions, Messaging, SourceUnit, Stage,
    pipeline::diagnostic::describe,
};

/// Configuration shared by every unit of one compile stage.
#[derive(Clone)]
pub struct CompileSettings {
    pub variables: IndexMap<String, String>,
    pub include_search_paths: Vec<PathBuf>,
    pub platform: Platform,
    pub definitions: RecordDefinitions,
    pub extensions: Extensions,
    /// `0` and `1` compile serially.
    pub threads: usize,
}

/// Compile every unit.
///
/// Units are independent: one that fails is reported and left out while the
/// rest are still compiled. The result keeps the order of `units`, and each
/// unit's diagnostics reach `messaging` in that same order however the
/// threads finish.
pub fn compile_units(
    units: &[SourceUnit],
    settings: &CompileSettings,
    messaging: &Messaging,
) -> Vec<Intermediate> {
    let threads = settings.threads.min(units.len());
    let outcomes: Vec<UnitOutcome> = if threads <= 1 {
        units.iter().map(|unit| compile_unit(unit, settings)).collect()
    } else {
        let chunk_size = units.len().div_ceil(threads);
        std::thread::scope(|scope| {
            let handles: Vec<_> = units
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|unit| compile_unit(unit, settings))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
    };

    outcomes
        .into_iter()
        .filter_map(|outcome| {
            for diagnostic in outcome.diagnostics {
                messaging.write(diagnostic);
            }
            outcome.intermediate
        })
        .collect()
}

/// One unit's result with the diagnostics it produced.
#[derive(Default)]
struct UnitOutcome {
    intermediate: Option<Intermediate>,
    diagnostics: Vec<Diagnostic>,
}

fn compile_unit(unit: &SourceUnit, settings: &CompileSettings) -> UnitOutcome {
    let mut outcome = UnitOutcome::default();

    let preprocess_ctx = PreprocessContext {
        source_file: unit.source.clone(),
        platform: settings.platform,
        include_search_paths: settings.include_search_paths.clone(),
        variables: settings.variables.clone(),
        extensions: settings.extensions.preprocessors().to_vec(),
    };

    let document = match preprocess(&preprocess_ctx) {
        Ok(document) => document,
        Err(err) => {
            outcome.diagnostics.push(source_error(&err));
            return outcome;
        }
    };
    for (location, message) in &document.warnings {
        outcome
            .diagnostics
            .push(Diagnostic::warning(Stage::Compile, message).at(location.to_string()));
    }

    let compile_ctx = CompileContext {
        compilation_id: new_identity(),
        platform: settings.platform,
        definitions: settings.definitions.clone(),
        extensions: settings.extensions.compilers().to_vec(),
    };

    let intermediate = match compile(&compile_ctx, &document) {
        Ok(intermediate) => intermediate,
        Err(errors) => {
            outcome
                .diagnostics
                .extend(errors.errors.iter().map(source_error));
            return outcome;
        }
    };

    if let Some(output) = &unit.output
        && let Err(err) = intermediate.save(output)
    {
        outcome.diagnostics.push(
            Diagnostic::error(Stage::Compile, err.number(), describe(&err))
                .at(output.display().to_string()),
        );
        return outcome;
    }

    debug!(
        source = %unit.source.display(),
        id = %intermediate.id,
        records = intermediate.records.len(),
        "compiled unit"
    );
    outcome.intermediate = Some(intermediate);
    outcome
}

fn source_error(err: &kiln_source::Error) -> Diagnostic {
    let diagnostic = Diagnostic::error(Stage::Compile, err.number(), describe(err));
    match err.location() {
        Some(location) => diagnostic.at(location.to_string()),
        None => diagnostic,
    }
}
