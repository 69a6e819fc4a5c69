//! List and describe commands - Inspect the available modules

use super::{CommandContext, Runnable};
use crate::error::{Error, Result};
use crate::modules::cloud::ionos::options::OptionSchema;
use clap::Parser;
use serde::Serialize;
use std::io::{self, Write};

/// Arguments for the list command
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {}

/// Arguments for the describe command
#[derive(Parser, Debug, Clone)]
pub struct DescribeArgs {
    /// Name of the module to describe
    pub module: String,
}

/// Documentation of a module, as printed by `describe`
#[derive(Debug, Serialize)]
pub struct ModuleDoc<'a> {
    pub module: &'a str,
    pub description: &'a str,
    #[serde(flatten)]
    pub schema: &'a OptionSchema,
}

impl Runnable for ListArgs {
    fn run(&self, ctx: &CommandContext) -> Result<i32> {
        let width = ctx.registry.names().iter().map(|n| n.len()).max().unwrap_or(0);
        let mut stdout = io::stdout().lock();
        for module in ctx.registry.modules() {
            writeln!(
                stdout,
                "{:width$}  {}",
                module.name(),
                module.description(),
                width = width
            )?;
        }
        Ok(0)
    }
}

impl Runnable for DescribeArgs {
    fn run(&self, ctx: &CommandContext) -> Result<i32> {
        let module = ctx
            .registry
            .get(&self.module)
            .ok_or_else(|| Error::ModuleNotFound(self.module.clone()))?;

        let doc = ModuleDoc {
            module: module.name(),
            description: module.description(),
            schema: module.schema(),
        };
        let mut stdout = io::stdout().lock();
        write!(stdout, "{}", serde_yaml::to_string(&doc)?)?;
        Ok(0)
    }
}
