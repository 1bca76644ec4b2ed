use std::path::{Path, PathBuf};

use clap::Args;
use eyre::{Result, bail};
use kiln_build::{BindPath, BuildOptions, Extensions, OutputKind, SourceUnit};
use kiln_core::Platform;
use tracing::debug;

use super::UnwrapOrExit;
use crate::{
    config::ProjectConfig,
    reports::{BuildReport, Report, TerminalOutput},
};

const DEFAULT_CONFIG: &str = "kiln.toml";

#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Source documents, each `input` or `input=compiled-output`
    pub sources: Vec<SourceUnit>,

    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Kind of output to produce
    #[arg(short = 't', long = "type", value_name = "KIND")]
    pub output_kind: Option<OutputKind>,

    /// Define a preprocessor variable
    #[arg(short = 'd', long = "define", value_name = "NAME=VALUE", value_parser = parse_define)]
    pub defines: Vec<(String, String)>,

    /// Add an include search path
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include: Vec<PathBuf>,

    /// Localization file to apply
    #[arg(long = "loc", value_name = "FILE")]
    pub localizations: Vec<PathBuf>,

    /// Library to link
    #[arg(long = "lib", value_name = "FILE")]
    pub libraries: Vec<PathBuf>,

    /// Bind path searched for referenced files, optionally named
    #[arg(short = 'b', long = "bindpath", value_name = "[NAME=]DIR")]
    pub bind_paths: Vec<BindPath>,

    /// Culture to build; repeat for fallbacks
    #[arg(long = "culture")]
    pub cultures: Vec<String>,

    /// Embed referenced files when building a library
    #[arg(long = "bindfiles")]
    pub bind_files: bool,

    /// Directory caching built cabinets between builds
    #[arg(long, value_name = "DIR")]
    pub cab_cache: Option<PathBuf>,

    /// Working folder for staged outputs
    #[arg(long, value_name = "DIR")]
    pub intermediate_folder: Option<PathBuf>,

    /// Target architecture
    #[arg(long = "arch", value_name = "ARCH")]
    pub platform: Option<Platform>,

    /// Write the list of consumed content files
    #[arg(long, value_name = "FILE")]
    pub contents_file: Option<PathBuf>,

    /// Write the list of declared outputs
    #[arg(long, value_name = "FILE")]
    pub outputs_file: Option<PathBuf>,

    /// Write the list of outputs actually written
    #[arg(long, value_name = "FILE")]
    pub built_outputs_file: Option<PathBuf>,

    /// Originating project file
    #[arg(long, value_name = "FILE")]
    pub project_file: Option<PathBuf>,

    /// Project configuration (defaults to ./kiln.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of threads compiling sources
    #[arg(short = 'j', long = "threads", value_name = "N")]
    pub threads: Option<usize>,
}

impl BuildCommand {
    /// Run the build command
    pub fn run(&self) -> Result<i32> {
        let config = match &self.config {
            Some(path) => ProjectConfig::open(path).unwrap_or_exit(),
            None if Path::new(DEFAULT_CONFIG).is_file() => {
                ProjectConfig::open(DEFAULT_CONFIG).unwrap_or_exit()
            }
            None => ProjectConfig::default(),
        };

        if let Some(path) = &config.path {
            debug!(path = %path.display(), "loaded project configuration");
        }
        let options = self.options(config)?;
        debug!(
            sources = options.sources.len(),
            output = %options.output_path.display(),
            kind = %options.output_kind,
            "resolved build options"
        );
        let output_path = options.output_path.clone();
        let output_kind = options.output_kind;

        let command = kiln_build::BuildCommand::new(options, Extensions::new());
        let status = command.execute();

        let report = BuildReport {
            output_path,
            output_kind,
            status,
            diagnostics: command.messaging().diagnostics(),
        };
        report.render(&mut TerminalOutput::new());

        Ok(status)
    }

    /// Command-line values on top of the project configuration.
    fn options(&self, config: ProjectConfig) -> Result<BuildOptions> {
        let mut options = config.into_options();

        options.sources.extend(self.sources.iter().cloned());
        options.variables.extend(self.defines.iter().cloned());
        options.include_search_paths.extend(self.include.iter().cloned());
        options.localization_files.extend(self.localizations.iter().cloned());
        options.library_files.extend(self.libraries.iter().cloned());
        options.bind_paths.extend(self.bind_paths.iter().cloned());
        options.cultures.extend(self.cultures.iter().cloned());
        options.bind_files |= self.bind_files;

        if let Some(output) = &self.output {
            options.output_path = output.clone();
        }
        if let Some(kind) = self.output_kind {
            options.output_kind = kind;
        }
        if let Some(platform) = self.platform {
            options.platform = platform;
        }
        if let Some(threads) = self.threads {
            options.compile_threads = threads;
        }
        if self.cab_cache.is_some() {
            options.cab_cache_path = self.cab_cache.clone();
        }
        if self.intermediate_folder.is_some() {
            options.intermediate_folder = self.intermediate_folder.clone();
        }
        if self.project_file.is_some() {
            options.project_file = self.project_file.clone();
        }
        options.contents_file = self.contents_file.clone();
        options.outputs_file = self.outputs_file.clone();
        options.built_outputs_file = self.built_outputs_file.clone();

        if options.output_path.as_os_str().is_empty() {
            bail!("no output path given; pass -o <path> or set build.output in {}", DEFAULT_CONFIG);
        }
        Ok(options)
    }
}

fn parse_define(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, _)) if name.is_empty() => Err(format!("missing variable name in '{}'", s)),
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        // a bare name is defined as empty
        None => Ok((s.to_string(), String::new())),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::Cli;

    fn parse(args: &[&str]) -> BuildCommand {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            build: BuildCommand,
        }

        let mut argv = vec!["kiln"];
        argv.extend_from_slice(args);
        Wrapper::try_parse_from(argv).unwrap().build
    }

    #[test]
    fn test_flags_map_to_options() {
        let command = parse(&[
            "product.kiln",
            "lib.kiln=obj/lib.kilnout",
            "-o",
            "out/widget.kilnpkg",
            "-t",
            "library",
            "-d",
            "Version=1.0.0",
            "-d",
            "Debug",
            "-b",
            "Payload=payload",
            "--arch",
            "x64",
            "-j",
            "4",
        ]);

        let options = command.options(ProjectConfig::default()).unwrap();

        assert_eq!(
            options.sources,
            vec![
                SourceUnit::new("product.kiln"),
                SourceUnit::new("lib.kiln").with_output("obj/lib.kilnout"),
            ]
        );
        assert_eq!(options.output_kind, OutputKind::Library);
        assert_eq!(options.platform, Platform::X64);
        assert_eq!(options.compile_threads, 4);
        assert_eq!(options.variables.get("Version").map(String::as_str), Some("1.0.0"));
        assert_eq!(options.variables.get("Debug").map(String::as_str), Some(""));
        assert_eq!(options.bind_paths, vec![BindPath::named("Payload", "payload")]);
    }

    #[test]
    fn test_command_line_extends_config() {
        let config = ProjectConfig::parse(
            "[build]\nsources = [\"a.kiln\"]\noutput = \"out/a.kilnpkg\"\narch = \"arm64\"\n[define]\nVersion = \"1.0.0\"\n",
            "kiln.toml",
            Path::new("/project"),
        )
        .unwrap();
        let command = parse(&["b.kiln", "-d", "Version=2.0.0"]);

        let options = command.options(config).unwrap();

        assert_eq!(options.sources.len(), 2);
        assert_eq!(options.output_path, PathBuf::from("/project/out/a.kilnpkg"));
        assert_eq!(options.platform, Platform::Arm64);
        assert_eq!(options.variables.get("Version").map(String::as_str), Some("2.0.0"));
    }

    #[test]
    fn test_output_is_required() {
        let err = parse(&["a.kiln"]).options(ProjectConfig::default()).unwrap_err();
        insta::assert_snapshot!(
            err,
            @"no output path given; pass -o <path> or set build.output in kiln.toml"
        );
    }

    #[test]
    fn test_bad_define_is_rejected() {
        assert!(Cli::try_parse_from(["kiln", "build", "a.kiln", "-d", "=x"]).is_err());
    }
}
