use super::models::{Config, PlatformMode};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Azure:ServiceBus:ConnectionString is required when Platform:Mode = Prod")]
    MissingServiceBusConnectionString,

    #[error("Azure:Storage:ConnectionString is required when Platform:Mode = Prod")]
    MissingStorageConnectionString,

    #[error("Azure:Storage:ContainerName must not be empty")]
    EmptyContainerName,
}

/// Cross-field checks beyond what serde defaults can express (spec §6).
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.azure.storage.container_name.trim().is_empty() {
        return Err(ValidationError::EmptyContainerName);
    }

    if config.platform.mode == PlatformMode::Prod {
        if config
            .azure
            .service_bus
            .connection_string
            .as_deref()
            .unwrap_or_default()
            .is_empty()
        {
            return Err(ValidationError::MissingServiceBusConnectionString);
        }
        if config
            .azure
            .storage
            .connection_string
            .as_deref()
            .unwrap_or_default()
            .is_empty()
        {
            return Err(ValidationError::MissingStorageConnectionString);
        }
    }

    Ok(())
}
