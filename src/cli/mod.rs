//! CLI module for the IONOS Cloud modules
//!
//! This module provides the command-line interface: argument parsing,
//! subcommand dispatch and result output.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Run IONOS Cloud modules from the command line
///
/// Parameters are read from a JSON/YAML file or inline JSON; the result is
/// printed on stdout and logs go to stderr.
#[derive(Parser, Debug, Clone)]
#[command(name = "ionos-module")]
#[command(author = "IONOS Cloud Modules Contributors")]
#[command(version)]
#[command(about = "Declarative IONOS Cloud provisioning modules", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run in check mode (dry-run, don't make changes)
    #[arg(long = "check", global = true)]
    pub check_mode: bool,

    /// Run in diff mode (show differences)
    #[arg(long = "diff", global = true)]
    pub diff_mode: bool,

    /// Output format of the result
    #[arg(long, global = true, default_value = "json")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Path to a settings file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a module
    Run(commands::run::RunArgs),

    /// List the available modules
    List(commands::describe::ListArgs),

    /// Show the option schema of a module
    Describe(commands::describe::DescribeArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["ionos-module", "run", "datacenter", "args.json"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.module, "datacenter");
                assert_eq!(args.args_file, Some(PathBuf::from("args.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ionos-module",
            "run",
            "lan",
            "--args",
            "{}",
            "--check",
            "--diff",
            "-vvvv",
        ])
        .unwrap();
        assert!(cli.check_mode);
        assert!(cli.diff_mode);
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_args_file_conflicts_with_inline_args() {
        let result = Cli::try_parse_from(["ionos-module", "run", "lan", "a.json", "--args", "{}"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format() {
        let cli = Cli::try_parse_from(["ionos-module", "--output", "yaml", "list"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Yaml);
    }
}
