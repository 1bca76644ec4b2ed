mod build;
mod completions;

use build::BuildCommand;
use clap::{Parser, Subcommand};
use completions::CompletionsCommand;
use eyre::Result;

/// Extension trait for exiting on configuration errors with pretty formatting
pub(crate) trait UnwrapOrExit<T> {
    fn unwrap_or_exit(self) -> T;
}

impl<T> UnwrapOrExit<T> for crate::config::Result<T> {
    fn unwrap_or_exit(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                eprintln!("{:?}", miette::Report::new(*e));
                std::process::exit(1);
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version)]
#[command(about = "Build installer packages from declarative source documents")]
pub(crate) struct Cli {
    /// Increase logging verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Run the selected command, returning the process exit status.
    pub fn run(&self) -> Result<i32> {
        match &self.command {
            Commands::Build(cmd) => cmd.run(),
            Commands::Completions(cmd) => cmd.run().map(|()| 0),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile sources and build a package, library or linked output
    Build(BuildCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}
