//! Configuration for the IONOS Cloud modules
//!
//! Handles loading and merging settings from multiple sources:
//! - Default values
//! - User configuration (~/.config/ionos-modules/config.toml)
//! - Project configuration (./ionos-modules.toml)
//! - An explicit file named by `IONOS_MODULES_CONFIG` or `--config`
//! - Environment variables
//!
//! Credentials are never read from these files. They arrive as module
//! parameters, with the `IONOS_*` environment variables as fallback.

use crate::modules::cloud::ionos::pagination::DEFAULT_PAGE_SIZE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every module invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL overrides keyed by service name (`compute`, `dns`, ...)
    pub endpoints: BTreeMap<String, String>,

    /// Timeout applied to every HTTP request
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,

    /// Delay between two polls while waiting for a resource
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Page size used when walking paginated listings
    pub page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            http_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Settings {
    /// Load settings from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut settings = Settings::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                settings = settings.merge_from_file(&path)?;
            }
        }

        settings.apply_env_overrides()?;

        Ok(settings)
    }

    /// Get the list of configuration file paths to check, lowest priority first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        // Explicit path takes priority
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ionos-modules").join("config.toml"));
        }

        paths.push(PathBuf::from("ionos-modules.toml"));

        if let Ok(env_config) = std::env::var("IONOS_MODULES_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Merge settings from a file
    fn merge_from_file(&self, path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let file_settings: Settings = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_settings))
    }

    /// Merge another settings value into this one
    fn merge(&self, other: Settings) -> Settings {
        let defaults = Settings::default();

        // Non-default values of `other` take precedence
        Settings {
            endpoints: {
                let mut endpoints = self.endpoints.clone();
                endpoints.extend(other.endpoints);
                endpoints
            },
            http_timeout: if other.http_timeout != defaults.http_timeout {
                other.http_timeout
            } else {
                self.http_timeout
            },
            poll_interval: if other.poll_interval != defaults.poll_interval {
                other.poll_interval
            } else {
                self.poll_interval
            },
            page_size: if other.page_size != defaults.page_size {
                other.page_size
            } else {
                self.page_size
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("IONOS_MODULES_POLL_INTERVAL") {
            self.poll_interval = humantime_serde::re::humantime::parse_duration(&value)
                .with_context(|| format!("Invalid IONOS_MODULES_POLL_INTERVAL: {}", value))?;
        }

        if let Ok(value) = std::env::var("IONOS_MODULES_HTTP_TIMEOUT") {
            self.http_timeout = humantime_serde::re::humantime::parse_duration(&value)
                .with_context(|| format!("Invalid IONOS_MODULES_HTTP_TIMEOUT: {}", value))?;
        }

        Ok(())
    }

    /// Endpoint override configured for a service, if any
    pub fn endpoint(&self, service: &str) -> Option<&str> {
        self.endpoints.get(service).map(String::as_str)
    }

    /// Load from a specific file only
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        Settings::default().merge_from_file(&path_buf)
    }
}
