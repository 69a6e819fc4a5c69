//! Subcommands module for the CLI
//!
//! This module contains all the subcommand implementations.

pub mod describe;
pub mod run;

use crate::cli::output::OutputFormatter;
use crate::cli::Cli;
use crate::config::Settings;
use crate::error::Result;
use crate::modules::{ModuleContext, ModuleRegistry};

/// Common context shared between commands
pub struct CommandContext {
    /// Settings loaded at startup
    pub settings: Settings,
    /// Output formatter
    pub output: OutputFormatter,
    /// Verbosity level
    pub verbosity: u8,
    /// Check mode (dry-run)
    pub check_mode: bool,
    /// Diff mode
    pub diff_mode: bool,
    /// Available modules
    pub registry: ModuleRegistry,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &Cli, settings: Settings) -> Self {
        Self {
            settings,
            output: OutputFormatter::new(cli.output),
            verbosity: cli.verbosity(),
            check_mode: cli.check_mode,
            diff_mode: cli.diff_mode,
            registry: ModuleRegistry::with_builtins(),
        }
    }

    /// The module context for a run from the command line
    pub fn module_context(&self) -> ModuleContext {
        ModuleContext::new()
            .with_settings(self.settings.clone())
            .with_check_mode(self.check_mode)
            .with_diff_mode(self.diff_mode)
    }
}

/// Trait for runnable commands
pub trait Runnable {
    /// Execute the command, returning the process exit code
    fn run(&self, ctx: &CommandContext) -> Result<i32>;
}
