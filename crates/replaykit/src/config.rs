//! Project configuration file support for replaykit.
//!
//! Loads configuration from `replaykit.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use replaykit_core::ReaderConfig;
use replaykit_logging::LogFormat;

/// Project-level configuration loaded from `replaykit.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// How replay readers are built
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Tracing filter, e.g. "info" or "replaykit_core=debug"
    pub level: Option<String>,
    pub format: Option<LogFormat>,
    /// Append JSON event lines to this file
    pub file: Option<PathBuf>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "replaykit.toml";

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

        Self::load_from(&config_path).map(Some)
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(config)
    }

    /// Effective log level. Priority: [logging].level > "warn"
    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or("warn")
    }

    /// Effective log format. Priority: [logging].format > Pretty
    pub fn log_format(&self) -> LogFormat {
        self.logging.format.unwrap_or_default()
    }
}
