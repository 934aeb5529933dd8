//! Configuration for the staging tool
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STAGING_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Staging persistence settings
    #[validate]
    pub staging: StagingConfig,

    /// Where snapshots are written
    #[validate]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct StagingConfig {
    /// Prefix of every snapshot key
    #[validate(length(min = 1, max = 64))]
    pub namespace: String,

    /// Snapshots older than this are discarded
    #[validate(range(min = 1, max = 720))]
    pub max_age_hours: i64,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct StorageConfig {
    /// Directory holding one JSON file per staging key
    #[validate(length(min = 1))]
    pub directory: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("STAGING_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("staging.namespace", shared::DEFAULT_NAMESPACE)?
            .set_default("staging.max_age_hours", shared::DEFAULT_MAX_AGE_HOURS)?
            .set_default("storage.directory", ".stockstage")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STAGING_ prefix)
            .add_source(
                Environment::with_prefix("STAGING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.staging.max_age_hours)
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            namespace: shared::DEFAULT_NAMESPACE.to_string(),
            max_age_hours: shared::DEFAULT_MAX_AGE_HOURS,
        }
    }
}
