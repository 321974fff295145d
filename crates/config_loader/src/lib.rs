//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce an `OutputConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("output.toml")).unwrap();
//! println!("Target: {}", config.target.destination());
//! ```

mod parser;
mod validator;

pub use contracts::OutputConfig;
pub use parser::ConfigFormat;

use contracts::IndexerError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<OutputConfig, IndexerError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<OutputConfig, IndexerError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize to TOML; secrets are written redacted
    pub fn to_toml(config: &OutputConfig) -> Result<String, IndexerError> {
        toml::to_string_pretty(config)
            .map_err(|e| IndexerError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize to JSON; secrets are written redacted
    pub fn to_json(config: &OutputConfig) -> Result<String, IndexerError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| IndexerError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, IndexerError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            IndexerError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            IndexerError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, IndexerError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<OutputConfig, IndexerError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}
