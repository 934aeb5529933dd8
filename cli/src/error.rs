//! Error handling for the staging tool

use shared::{StagingError, StoreError};
use thiserror::Error;

/// Errors surfaced by CLI commands
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Could not read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No staged entry with id '{0}'")]
    UnknownEntry(String),
}

/// Result type alias for CLI commands
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_errors_pass_through() {
        let err = CliError::from(StagingError::NothingStaged);
        assert_eq!(err.to_string(), StagingError::NothingStaged.to_string());
    }

    #[test]
    fn test_unknown_entry_message() {
        let err = CliError::UnknownEntry("abc".to_string());
        assert!(err.to_string().contains("abc"));
    }
}
