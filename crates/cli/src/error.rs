//! Error types for CLI operations.

use std::path::PathBuf;

use contracts::IndexerError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded, validated or turned into a dispatcher
    #[error("Invalid configuration: {0}")]
    Config(#[from] IndexerError),

    /// Input stream could not be opened or read
    #[error("Failed to read records from {source_name}: {source}")]
    Input {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// Whole batches were lost during the run
    #[error("{failed_batches} batch(es) not delivered, {failed_documents} document(s) lost")]
    Delivery {
        failed_batches: u64,
        failed_documents: u64,
    },

    /// Run did not finish within the requested time
    #[error("Run timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl CliError {
    pub fn config_not_found(path: &std::path::Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn input(path: Option<&PathBuf>, source: std::io::Error) -> Self {
        Self::Input {
            source_name: path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stdin".to_string()),
            source,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
