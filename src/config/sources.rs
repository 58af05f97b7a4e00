use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "DTCE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/dtce.toml";
const ENV_PREFIX: &str = "DTCE";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from a `.env` file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment. Useful for
/// testing with custom config files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // DTCE__AZURE__SERVICE_BUS__CONNECTION_STRING -> azure.service_bus.connection_string
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::PlatformMode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.platform.mode, PlatformMode::Dev);
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[platform]
mode = "Prod"

[server]
bind_addr = "127.0.0.1:9000"
max_upload_bytes = "10MB"

[azure.service_bus]
connection_string = "Endpoint=sb://example"

[azure.storage]
connection_string = "DefaultEndpointsProtocol=https;..."
container_name = "custom-container"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.max_upload_bytes.as_u64(), 10 * 1024 * 1024);
        assert_eq!(config.platform.mode, PlatformMode::Prod);
        assert_eq!(config.azure.storage.container_name, "custom-container");
    }

    #[test]
    fn messaging_and_storage_roots_are_configurable() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[storage]
root_path = "/var/dtce/storage"

[messaging]
root_path = "/var/dtce/queues"
poll_interval_ms = 500
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.storage.root_path.to_str().unwrap(), "/var/dtce/storage");
        assert_eq!(config.messaging.root_path.to_str().unwrap(), "/var/dtce/queues");
        assert_eq!(config.messaging.poll_interval_ms, 500);
    }
}
