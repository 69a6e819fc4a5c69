//! Result output.
//!
//! Results go to stdout, in the selected format, and nothing else does.

use super::OutputFormat;
use crate::error::Result;
use serde::Serialize;
use std::io::{self, Write};

/// Writes serializable results to stdout
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a value in the configured format
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }

    /// Print a value to stdout
    pub fn print<T: Serialize>(&self, value: &T) -> Result<()> {
        let rendered = self.render(value)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", rendered.trim_end())?;
        Ok(())
    }
}
