//! Optional `kiln.toml` project configuration.
//!
//! ```toml
//! [build]
//! sources = ["src/product.kiln", "src/components.kiln"]
//! output = "out/widget.kilnpkg"
//! type = "package"
//! arch = "x64"
//! localizations = ["loc/en-us.kilnloc"]
//! bind-paths = ["payload", "Docs=docs"]
//!
//! [define]
//! Version = "1.0.0"
//! ```
//!
//! Relative paths are taken from the directory holding the file. Values
//! here are defaults: command-line flags extend lists and override scalars.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use indexmap::IndexMap;
use kiln_build::{BindPath, BuildOptions, OutputKind, SourceUnit};
use kiln_core::Platform;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Deserialize;
use thiserror::Error;
use toml::Spanned;

pub type Result<T> = std::result::Result<T, Box<Error>>;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("failed to read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse project configuration")]
    #[diagnostic(code(kiln::config::parse_error))]
    Parse {
        #[source_code]
        src: NamedSource<String>,
        #[label("parse error here")]
        span: Option<SourceSpan>,
        #[source]
        source: toml::de::Error,
    },

    #[error("{message}")]
    #[diagnostic(code(kiln::config::invalid_value))]
    Invalid {
        #[source_code]
        src: NamedSource<String>,
        #[label("invalid value")]
        span: SourceSpan,
        message: String,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    build: BuildSection,
    #[serde(default)]
    define: IndexMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct BuildSection {
    sources: Vec<Spanned<String>>,
    output: Option<PathBuf>,
    #[serde(rename = "type")]
    output_kind: Option<OutputKind>,
    arch: Option<Platform>,
    include: Vec<PathBuf>,
    localizations: Vec<PathBuf>,
    libraries: Vec<PathBuf>,
    bind_paths: Vec<Spanned<String>>,
    cultures: Vec<String>,
    bind_files: Option<bool>,
    cab_cache: Option<PathBuf>,
    intermediate_folder: Option<PathBuf>,
    threads: Option<usize>,
}

/// A parsed project file, with paths made relative to its directory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProjectConfig {
    pub path: Option<PathBuf>,
    pub sources: Vec<SourceUnit>,
    pub output: Option<PathBuf>,
    pub output_kind: Option<OutputKind>,
    pub platform: Option<Platform>,
    pub variables: IndexMap<String, String>,
    pub include_search_paths: Vec<PathBuf>,
    pub localization_files: Vec<PathBuf>,
    pub library_files: Vec<PathBuf>,
    pub bind_paths: Vec<BindPath>,
    pub cultures: Vec<String>,
    pub bind_files: Option<bool>,
    pub cab_cache_path: Option<PathBuf>,
    pub intermediate_folder: Option<PathBuf>,
    pub threads: Option<usize>,
}

impl ProjectConfig {
    /// Read and parse a project file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| {
            Box::new(Error::Io {
                path: path.to_path_buf(),
                source,
            })
        })?;
        let base = path.parent().unwrap_or(Path::new(""));
        let mut config = Self::parse(&content, &path.display().to_string(), base)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse project file content. `filename` is used in error reports.
    pub fn parse(content: &str, filename: &str, base: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|source| {
            Box::new(Error::Parse {
                src: NamedSource::new(filename, content.to_string()),
                span: source.span().map(SourceSpan::from),
                source,
            })
        })?;
        let build = file.build;

        let resolve = |path: PathBuf| base.join(path);
        let sources = parse_spanned::<SourceUnit>(build.sources, "source", content, filename)?
            .into_iter()
            .map(|unit| SourceUnit {
                source: resolve(unit.source),
                output: unit.output.map(resolve),
            })
            .collect();
        let bind_paths = parse_spanned::<BindPath>(build.bind_paths, "bind path", content, filename)?
            .into_iter()
            .map(|bind| BindPath {
                path: resolve(bind.path),
                ..bind
            })
            .collect();

        Ok(Self {
            path: None,
            sources,
            output: build.output.map(resolve),
            output_kind: build.output_kind,
            platform: build.arch,
            variables: file.define,
            include_search_paths: build.include.into_iter().map(resolve).collect(),
            localization_files: build.localizations.into_iter().map(resolve).collect(),
            library_files: build.libraries.into_iter().map(resolve).collect(),
            bind_paths,
            cultures: build.cultures,
            bind_files: build.bind_files,
            cab_cache_path: build.cab_cache.map(resolve),
            intermediate_folder: build.intermediate_folder.map(resolve),
            threads: build.threads,
        })
    }

    /// Build options with this configuration's values as the starting point.
    pub fn into_options(self) -> BuildOptions {
        BuildOptions {
            sources: self.sources,
            variables: self.variables,
            include_search_paths: self.include_search_paths,
            localization_files: self.localization_files,
            library_files: self.library_files,
            output_path: self.output.unwrap_or_default(),
            output_kind: self.output_kind.unwrap_or_default(),
            cab_cache_path: self.cab_cache_path,
            cultures: self.cultures,
            bind_files: self.bind_files.unwrap_or(false),
            bind_paths: self.bind_paths,
            intermediate_folder: self.intermediate_folder,
            project_file: self.path,
            platform: self.platform.unwrap_or_default(),
            compile_threads: self.threads.unwrap_or(0),
            ..Default::default()
        }
    }
}

/// Parse string values with their `FromStr`, pointing errors at the value.
fn parse_spanned<T: FromStr<Err = String>>(
    values: Vec<Spanned<String>>,
    what: &str,
    content: &str,
    filename: &str,
) -> Result<Vec<T>> {
    values
        .into_iter()
        .map(|value| {
            value.get_ref().parse::<T>().map_err(|message| {
                Box::new(Error::Invalid {
                    src: NamedSource::new(filename, content.to_string()),
                    span: value.span().into(),
                    message: format!("invalid {}: {}", what, message),
                })
            })
        })
        .collect()
}
