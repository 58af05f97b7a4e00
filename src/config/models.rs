use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration (spec §6 "Configuration keys").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub storage: LocalStorageConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// `Platform:Mode` — backend selector between the local filesystem
/// implementations and the Azure-backed cloud implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlatformConfig {
    #[serde(default)]
    pub mode: PlatformMode,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            mode: PlatformMode::Dev,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum PlatformMode {
    Dev,
    Prod,
}

impl Default for PlatformMode {
    fn default() -> Self {
        PlatformMode::Dev
    }
}

/// `Azure:ServiceBus:*` / `Azure:Storage:*`. Only required when
/// `Platform:Mode = Prod` (enforced by `config::validation`).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub service_bus: AzureServiceBusConfig,
    #[serde(default)]
    pub storage: AzureStorageConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AzureServiceBusConfig {
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AzureStorageConfig {
    pub connection_string: Option<String>,
    #[serde(default = "default_container_name")]
    pub container_name: String,
}

impl Default for AzureStorageConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            container_name: default_container_name(),
        }
    }
}

fn default_container_name() -> String {
    "dtce-documents".to_string()
}

/// `Storage:RootPath` — local object-store root.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_storage_root")]
    pub root_path: PathBuf,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/storage")
}

/// `Messaging:RootPath`, `Messaging:PollInterval`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagingConfig {
    #[serde(default = "default_messaging_root")]
    pub root_path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            root_path: default_messaging_root(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_messaging_root() -> PathBuf {
    PathBuf::from("data/queues")
}

/// Default matches spec §4.3 "~250 ms".
fn default_poll_interval_ms() -> u64 {
    250
}

/// Gateway adapter settings (C9); not itself part of the core under
/// specification but required to bind the HTTP surface described in §6.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// `document.length <= 50 MiB` (spec §6).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: ByteSize,
    /// Base URL local pre-signed URLs are synthesized against
    /// (`{gatewayBaseUrl}/api/v1/jobs/files/{key}`, spec §6).
    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,
    /// `X-API-Key`; required in Prod, optional in Dev (spec §6).
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_upload_bytes: default_max_upload_bytes(),
            gateway_base_url: default_gateway_base_url(),
            api_key: None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_max_upload_bytes() -> ByteSize {
    ByteSize(50 * 1024 * 1024)
}

fn default_gateway_base_url() -> String {
    "http://localhost:8080".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config {
            platform: PlatformConfig::default(),
            azure: AzureConfig::default(),
            storage: LocalStorageConfig::default(),
            messaging: MessagingConfig::default(),
            server: ServerConfig::default(),
        };

        assert_eq!(config.platform.mode, PlatformMode::Dev);
        assert_eq!(config.azure.storage.container_name, "dtce-documents");
        assert_eq!(config.messaging.poll_interval_ms, 250);
        assert_eq!(config.server.max_upload_bytes.as_u64(), 50 * 1024 * 1024);
    }
}
