//! Error types for the IONOS Cloud modules.
//!
//! Module execution has its own error type, [`ModuleError`](crate::modules::ModuleError),
//! which is always converted into a failed module result at the module boundary.
//! The [`Error`] type defined here covers everything around a module run: loading
//! parameters, reading settings and writing the result.

use crate::modules::ModuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the command line and configuration layer.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Module Errors
    // ========================================================================
    /// Module not found in the registry.
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    /// Module execution error that escaped the module boundary.
    #[error(transparent)]
    Module(#[from] ModuleError),

    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Error loading module arguments.
    #[error("Failed to load module arguments from '{path}': {message}")]
    ArgsLoad {
        /// Path to the arguments file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Module arguments were not a mapping.
    #[error("Module arguments must be a mapping, got {0}")]
    ArgsShape(String),

    // ========================================================================
    // IO and Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new argument loading error.
    pub fn args_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ArgsLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ModuleNotFound(_) => 2,
            Error::ArgsLoad { .. } | Error::ArgsShape(_) => 3,
            _ => 1,
        }
    }
}
