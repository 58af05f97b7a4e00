//! Configuration management for the document pipeline (spec §6).
//!
//! Layered loading, matching the teacher's `config/sources.rs`:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use dtce::config::Config;
//!
//! let config = Config::load().expect("failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `DTCE__<section>__<key>`, e.g.
//! `DTCE__AZURE__STORAGE__CONNECTION_STRING=...`.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    AzureConfig, AzureServiceBusConfig, AzureStorageConfig, Config, LocalStorageConfig,
    MessagingConfig, PlatformConfig, PlatformMode, ServerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    ///
    /// Priority, highest to lowest: environment variables (`DTCE__*`),
    /// TOML file (default `config/dtce.toml`), default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path. Useful for testing with
    /// custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.platform.mode, PlatformMode::Dev);
    }

    #[test]
    fn prod_mode_without_connection_strings_fails_validation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        fs::write(&config_path, "[platform]\nmode = \"Prod\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
