//! Run command - Execute a single module
//!
//! Parameters come from an arguments file (JSON or YAML, by extension) or
//! from inline JSON. A file written for Ansible, with the parameters wrapped
//! in `ANSIBLE_MODULE_ARGS`, is accepted as well; its `_ansible_check_mode`
//! and `_ansible_diff` flags switch on check and diff mode.

use super::{CommandContext, Runnable};
use crate::error::{Error, Result};
use crate::modules::ModuleParams;
use clap::Parser;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Name of the module to run
    pub module: String,

    /// JSON or YAML file with the module parameters
    pub args_file: Option<PathBuf>,

    /// Module parameters as inline JSON
    #[arg(short = 'a', long = "args", conflicts_with = "args_file")]
    pub args: Option<String>,
}

/// Parameters of one module run, with the mode flags found next to them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleArgs {
    pub params: ModuleParams,
    pub check_mode: bool,
    pub diff_mode: bool,
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

impl ModuleArgs {
    /// Unwrap `ANSIBLE_MODULE_ARGS` if present and read the mode flags
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::default()),
            other => return Err(Error::ArgsShape(kind_of(&other).to_string())),
        };

        if let Some(wrapped) = map.remove("ANSIBLE_MODULE_ARGS") {
            map = match wrapped {
                Value::Object(inner) => inner,
                other => return Err(Error::ArgsShape(kind_of(&other).to_string())),
            };
        }

        let flag = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);
        let check_mode = flag("_ansible_check_mode");
        let diff_mode = flag("_ansible_diff");

        Ok(Self {
            params: map.into_iter().collect(),
            check_mode,
            diff_mode,
        })
    }

    /// Parse an arguments document, as JSON for `.json` files and YAML otherwise
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        let value: Value = if is_json {
            serde_json::from_str(text).map_err(|e| Error::args_load(path, e.to_string()))?
        } else {
            serde_yaml::from_str(text).map_err(|e| Error::args_load(path, e.to_string()))?
        };
        Self::from_value(value)
    }
}

impl RunArgs {
    /// Load the module parameters from the file or inline JSON
    pub fn load(&self) -> Result<ModuleArgs> {
        if let Some(path) = &self.args_file {
            debug!(path = %path.display(), "reading module arguments");
            let text = fs::read_to_string(path).map_err(|e| Error::args_load(path, e.to_string()))?;
            return ModuleArgs::parse(&text, path);
        }

        match &self.args {
            Some(inline) => {
                let value: Value = serde_json::from_str(inline)
                    .map_err(|e| Error::args_load("<inline>", e.to_string()))?;
                ModuleArgs::from_value(value)
            }
            None => Ok(ModuleArgs::default()),
        }
    }
}

impl Runnable for RunArgs {
    fn run(&self, ctx: &CommandContext) -> Result<i32> {
        if !ctx.registry.contains(&self.module) {
            return Err(Error::ModuleNotFound(self.module.clone()));
        }

        let args = self.load()?;
        let context = ctx
            .module_context()
            .with_check_mode(ctx.check_mode || args.check_mode)
            .with_diff_mode(ctx.diff_mode || args.diff_mode);

        info!(module = %self.module, check_mode = context.check_mode, "running module");
        let output = ctx.registry.run(&self.module, &args.params, &context);
        ctx.output.print(&output)?;

        Ok(if output.failed { 1 } else { 0 })
    }
}
