//! Project configuration file support for txlog.
//!
//! Loads configuration from `txlog.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use txlog_core::Level;
use txlog_logging::LogFormat;

/// Project-level configuration loaded from `txlog.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Session verbosity threshold (level name or number)
    pub verbosity: Option<String>,
    /// Chart width in columns
    pub width: Option<usize>,
    /// Diagnostic log level for the tool itself
    pub log_level: Option<String>,
    /// Diagnostic log format (pretty, json, compact)
    pub log_format: Option<String>,
    /// Where `txlog demo` stores records when no output file is given
    pub records_dir: Option<PathBuf>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "txlog.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Parsed verbosity, if configured.
    pub fn verbosity(&self) -> Result<Option<Level>> {
        self.verbosity
            .as_deref()
            .map(|name| {
                name.parse::<Level>()
                    .with_context(|| format!("Invalid verbosity in {}", CONFIG_FILE_NAME))
            })
            .transpose()
    }

    /// Parsed log format, if configured.
    pub fn log_format(&self) -> Result<Option<LogFormat>> {
        self.log_format
            .as_deref()
            .map(|name| name.parse::<LogFormat>().map_err(anyhow::Error::msg))
            .transpose()
    }
}
