//! Content-addressed blob I/O with pre-signed URLs (C1). One trait, two
//! conformant implementations bound at process start by `Platform:Mode`.

pub mod cloud;
pub mod local;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("key '{0}' escapes the configured storage root")]
    InvalidKey(String),

    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Backend-neutral blob store (spec §4.1). Keys are slash-separated
/// path-like strings; implementations reject keys containing `..`
/// components.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes all bytes; overwrites are permitted but never issued by the
    /// pipeline.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fails with `NotFound` if `key` is absent.
    async fn download(&self, key: &str) -> Result<Vec<u8>>;

    /// Time-bounded read URL. For the local backend this is a gateway
    /// file-serving route; `ttl` is accepted for interface symmetry but the
    /// local backend never enforces it (spec §9 Open Questions).
    async fn presigned_url(&self, key: &str, ttl: std::time::Duration) -> Result<String>;

    /// Idempotent; absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Rejects keys with `..` components or that are empty/absolute; this is
/// the one check both backends share, since the spec makes it a property
/// of the interface rather than of either implementation.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|segment| segment == ".." || segment == ".") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_traversal() {
        assert!(validate_key("documents/../secrets").is_err());
        assert!(validate_key("../../etc/passwd").is_err());
        assert!(validate_key("/absolute/path").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn accepts_well_formed_keys() {
        assert!(validate_key("documents/job-1/file.docx").is_ok());
        assert!(validate_key("results/job-1/template.json").is_ok());
    }
}
