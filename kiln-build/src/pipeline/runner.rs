//! Build orchestrator.

use std::{
    fs,
    path::{Path, PathBuf},
};

use kiln_core::{codes, new_identity};
use kiln_ir::{Intermediate, RecordDefinitions};
use tracing::{debug, info, info_span};

use super::{
    Extensions, Messaging, Stage,
    stages::{
        BindContext, CompileSettings, LayoutContext, LibraryContext, LinkContext,
        ResolveContext, bind, combine, compile_units, layout, link, resolve,
    },
};
use crate::{
    BuildOptions, OutputKind,
    loaders::{load_libraries, load_localizations},
};

/// Runs one build from source units to the requested output.
///
/// Every stage writes to the command's [`Messaging`] sink. After each stage
/// the sink is checked and a recorded error skips the remaining stages;
/// `execute` never panics or returns an `Err` for a failed build.
///
/// # Example
///
/// ```ignore
/// let command = BuildCommand::new(options, Extensions::new().linker(MyLinker));
/// let status = command.execute();
/// ```
pub struct BuildCommand {
    options: BuildOptions,
    extensions: Extensions,
    messaging: Messaging,
}

impl BuildCommand {
    /// Create a new build command.
    pub fn new(options: BuildOptions, extensions: Extensions) -> Self {
        Self {
            options,
            extensions,
            messaging: Messaging::new(),
        }
    }

    /// The diagnostics recorded so far.
    pub fn messaging(&self) -> &Messaging {
        &self.messaging
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Run the build.
    ///
    /// Returns `0` on success, otherwise the code of the last recorded error.
    pub fn execute(&self) -> i32 {
        let _span = info_span!(
            "build",
            output = %self.options.output_path.display(),
            kind = %self.options.output_kind
        )
        .entered();

        if self.options.sources.is_empty() {
            self.messaging
                .error(Stage::Compile, codes::NO_SOURCES, "no source files were supplied");
            return self.status();
        }

        let definitions = self.extensions.definitions();
        let intermediates = self.run_stage(Stage::Compile, || {
            compile_units(
                &self.options.sources,
                &CompileSettings {
                    variables: self.options.variables.clone(),
                    include_search_paths: self.options.include_search_paths.clone(),
                    platform: self.options.platform,
                    definitions: definitions.clone(),
                    extensions: self.extensions.clone(),
                    threads: self.options.compile_threads,
                },
                &self.messaging,
            )
        });

        if intermediates.is_empty() {
            self.messaging.error(
                Stage::Compile,
                codes::NO_INTERMEDIATES,
                "no source unit compiled successfully",
            );
            return self.status();
        }
        if self.messaging.encountered_error() {
            return self.status();
        }

        match self.options.output_kind {
            OutputKind::Library => self.build_library(intermediates),
            OutputKind::IntermediateOutput => self.build_output(intermediates, &definitions),
            OutputKind::Package => self.build_package(intermediates, &definitions),
        }

        let status = self.status();
        info!(
            status,
            errors = self.messaging.error_count(),
            warnings = self.messaging.warning_count(),
            "build finished"
        );
        status
    }

    fn build_library(&self, intermediates: Vec<Intermediate>) {
        let Some(localizations) = self.localizations() else {
            return;
        };

        let library = self.run_stage(Stage::Library, || {
            combine(
                LibraryContext {
                    intermediates,
                    localizations,
                    bind_files: self.options.bind_files,
                    bind_paths: self.options.bind_paths.clone(),
                },
                &self.messaging,
            )
        });
        if let Some(library) = library {
            self.save(&library, Stage::Library, codes::LIBRARY_WRITE);
        }
    }

    fn build_output(&self, intermediates: Vec<Intermediate>, definitions: &RecordDefinitions) {
        if let Some(output) = self.link(intermediates, definitions) {
            self.save(&output, Stage::Link, codes::OUTPUT_WRITE);
        }
    }

    fn build_package(&self, intermediates: Vec<Intermediate>, definitions: &RecordDefinitions) {
        let Some(output) = self.link(intermediates, definitions) else {
            return;
        };
        let Some(localizations) = self.localizations() else {
            return;
        };

        let resolved = self.run_stage(Stage::Resolve, || {
            resolve(
                ResolveContext {
                    intermediate: output,
                    localizations,
                    cultures: self.options.cultures.clone(),
                    bind_paths: self.options.bind_paths.clone(),
                },
                &self.messaging,
            )
        });
        let Some(resolved) = resolved else {
            return;
        };

        let folder = WorkingFolder::for_build(&self.options);
        let bound = self.run_stage(Stage::Bind, || {
            bind(
                BindContext {
                    resolved,
                    output_path: self.options.output_path.clone(),
                    pdb_path: self.options.pdb_path(),
                    intermediate_folder: folder.path.clone(),
                    cab_cache_path: self.options.cab_cache_path.clone(),
                    platform: self.options.platform,
                    extensions: self.extensions.binders().to_vec(),
                },
                &self.messaging,
            )
        });
        let Some(bound) = bound else {
            return;
        };

        self.run_stage(Stage::Layout, || {
            layout(
                LayoutContext {
                    file_transfers: bound.file_transfers,
                    content_file_paths: bound.content_file_paths,
                    contents_file: self.options.contents_file.clone(),
                    outputs_file: self.options.outputs_file.clone(),
                    built_outputs_file: self.options.built_outputs_file.clone(),
                },
                &self.messaging,
            )
        });
    }

    fn link(
        &self,
        intermediates: Vec<Intermediate>,
        definitions: &RecordDefinitions,
    ) -> Option<Intermediate> {
        self.run_stage(Stage::Link, || {
            let libraries = load_libraries(&self.options.library_files, definitions, &self.messaging);
            if self.messaging.encountered_error() {
                return None;
            }
            link(
                LinkContext {
                    intermediates,
                    libraries,
                    extensions: self.extensions.linkers().to_vec(),
                },
                &self.messaging,
            )
        })
    }

    /// Parse every localization file; `None` when any failed.
    fn localizations(&self) -> Option<Vec<kiln_ir::Localization>> {
        let localizations = self.run_stage(Stage::Localize, || {
            load_localizations(&self.options.localization_files, &self.messaging)
        });
        (!self.messaging.encountered_error()).then_some(localizations)
    }

    fn save(&self, intermediate: &Intermediate, stage: Stage, number: i32) {
        let path: &Path = &self.options.output_path;
        match intermediate.save(path) {
            Ok(()) => debug!(path = %path.display(), id = %intermediate.id, "wrote output"),
            Err(err) => self.messaging.error(
                stage,
                number,
                format!(
                    "failed to write '{}': {}",
                    path.display(),
                    super::describe(&err)
                ),
            ),
        }
    }

    fn run_stage<T>(&self, stage: Stage, run: impl FnOnce() -> T) -> T {
        let _span = info_span!("stage", name = stage.name()).entered();
        debug!("{}", stage.description());
        run()
    }

    fn status(&self) -> i32 {
        if self.messaging.encountered_error() {
            self.messaging.last_error_number()
        } else {
            0
        }
    }
}

/// Where bind stages its outputs.
///
/// Without a configured folder every build gets a fresh directory under the
/// system temp directory, removed again when the build is done with it.
struct WorkingFolder {
    path: PathBuf,
    scratch: bool,
}

impl WorkingFolder {
    fn for_build(options: &BuildOptions) -> Self {
        match &options.intermediate_folder {
            Some(path) => Self {
                path: path.clone(),
                scratch: false,
            },
            None => Self {
                path: std::env::temp_dir().join(format!("kiln-{}", new_identity())),
                scratch: true,
            },
        }
    }
}

impl Drop for WorkingFolder {
    fn drop(&mut self) {
        if !self.scratch {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), error = %err, "could not remove working folder");
            }
            _ => {}
        }
    }
}
