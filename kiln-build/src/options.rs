//! Typed boundary inputs of a build.

use std::{fmt, path::PathBuf, str::FromStr};

use indexmap::IndexMap;
use kiln_core::Platform;
use serde::{Deserialize, Serialize};

/// Selects the shape of the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Combine compiled units into a reusable library container.
    Library,
    /// Link and save the linked intermediate without binding.
    #[serde(rename = "intermediate")]
    IntermediateOutput,
    /// Link, resolve, bind and lay out an installer package.
    #[default]
    Package,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Library => "library",
            OutputKind::IntermediateOutput => "intermediate",
            OutputKind::Package => "package",
        }
    }

    /// Conventional file extension for this kind of output.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Library => "kilnlib",
            OutputKind::IntermediateOutput => "kilnout",
            OutputKind::Package => "kilnpkg",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "library" | "lib" => Ok(OutputKind::Library),
            "intermediate" | "out" => Ok(OutputKind::IntermediateOutput),
            "package" | "pkg" => Ok(OutputKind::Package),
            _ => Err(format!(
                "unknown output kind '{}' (expected library, intermediate or package)",
                s
            )),
        }
    }
}

/// One source document to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub source: PathBuf,
    /// Where the unit's compiled intermediate is written, if anywhere.
    pub output: Option<PathBuf>,
}

impl SourceUnit {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

impl FromStr for SourceUnit {
    type Err = String;

    /// Parse `input` or `input=compiled-output`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((source, _)) if source.is_empty() => Err(format!("missing source in '{}'", s)),
            Some((source, output)) if !output.is_empty() => {
                Ok(SourceUnit::new(source).with_output(output))
            }
            Some((source, _)) => Ok(SourceUnit::new(source)),
            None if s.is_empty() => Err("empty source path".to_string()),
            None => Ok(SourceUnit::new(s)),
        }
    }
}

/// A root searched for files referenced by records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindPath {
    /// Named roots are only searched for `bindpath.<name>\...` references.
    pub name: Option<String>,
    pub path: PathBuf,
}

impl BindPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            path: path.into(),
        }
    }

    pub fn named(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: Some(name.into()),
            path: path.into(),
        }
    }
}

impl FromStr for BindPath {
    type Err = String;

    /// Parse `dir` or `Name=dir`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty bind path".to_string());
        }
        match s.split_once('=') {
            Some((name, path))
                if !name.is_empty()
                    && !path.is_empty()
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                Ok(BindPath::named(name, path))
            }
            _ => Ok(BindPath::new(s)),
        }
    }
}

/// Everything a build consumes.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub sources: Vec<SourceUnit>,
    /// Preprocessor variables, available as `$(var.Name)`.
    pub variables: IndexMap<String, String>,
    pub include_search_paths: Vec<PathBuf>,
    pub localization_files: Vec<PathBuf>,
    /// Libraries to link; ignored when building a library.
    pub library_files: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub output_kind: OutputKind,
    pub cab_cache_path: Option<PathBuf>,
    pub cultures: Vec<String>,
    /// Embed referenced files into a library instead of referencing them.
    pub bind_files: bool,
    pub bind_paths: Vec<BindPath>,
    /// Working folder for staged outputs; a fresh folder under the system
    /// temp directory, removed after the build, when unset.
    pub intermediate_folder: Option<PathBuf>,
    pub contents_file: Option<PathBuf>,
    pub outputs_file: Option<PathBuf>,
    pub built_outputs_file: Option<PathBuf>,
    /// Originating project file, carried for tooling.
    pub project_file: Option<PathBuf>,
    pub platform: Platform,
    /// Number of threads compiling sources; `0` and `1` compile serially.
    pub compile_threads: usize,
}

impl BuildOptions {
    /// The debug-symbol side-file written beside a package.
    pub fn pdb_path(&self) -> PathBuf {
        self.output_path.with_extension("kilnpdb")
    }
}
