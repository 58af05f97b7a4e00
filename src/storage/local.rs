//! Filesystem-rooted `DocumentStore`, backed by `object_store`'s local
//! filesystem implementation (the same crate the cloud backend uses),
//! matching the teacher's wrapping style in the now-removed
//! `storage/mod.rs::StorageClient`.

use super::{validate_key, DocumentStore, Result, StorageError};
use async_trait::async_trait;
use object_store::{local::LocalFileSystem, path::Path as StorePath, ObjectStore};
use std::sync::Arc;
use std::time::Duration;

pub struct LocalObjectStore {
    store: Arc<LocalFileSystem>,
    /// Base URL the gateway serves file routes from, e.g.
    /// `http://localhost:8080`. Used only to synthesize pre-signed URLs.
    gateway_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<std::path::Path>, gateway_base_url: impl Into<String>) -> std::io::Result<Self> {
        std::fs::create_dir_all(&root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self {
            store: Arc::new(store),
            gateway_base_url: gateway_base_url.into(),
        })
    }

    /// URL-encode each path segment, preserving slashes (spec §4.1, §6).
    fn encode_key(key: &str) -> String {
        key.split('/')
            .map(|segment| urlencoding_segment(segment))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Minimal percent-encoding for a single path segment. No crate in the
/// example pack is pulled in solely for URL-encoding; this covers the
/// character set that actually appears in uploaded filenames and keys.
fn urlencoding_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[async_trait]
impl DocumentStore for LocalObjectStore {
    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        validate_key(key)?;
        let path = StorePath::from(key);
        let size = data.len();
        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        tracing::info!(key, size, "uploaded object to local store");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let path = StorePath::from(key);
        let result = match self.store.get(&path).await {
            Ok(r) => r,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::DownloadFailed(e.to_string())),
        };
        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn presigned_url(&self, key: &str, _ttl: Duration) -> Result<String> {
        validate_key(key)?;
        if !self.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!(
            "{}/api/v1/jobs/files/{}",
            self.gateway_base_url.trim_end_matches('/'),
            Self::encode_key(key)
        ))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = StorePath::from(key);
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::Backend(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let path = StorePath::from(key);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::Backend(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_download_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8080").unwrap();
        store
            .upload("documents/job-1/a.docx", b"hello".to_vec(), "application/octet-stream")
            .await
            .unwrap();
        let bytes = store.download("documents/job-1/a.docx").await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn download_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8080").unwrap();
        let err = store.download("documents/job-1/missing.docx").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn presigned_url_encodes_segments_and_preserves_slashes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8080/").unwrap();
        store
            .upload("results/job 1/template.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        let url = store
            .presigned_url("results/job 1/template.json", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(
            url,
            "http://localhost:8080/api/v1/jobs/files/results/job%201/template.json"
        );
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8080").unwrap();
        store.delete("documents/job-1/never-existed.docx").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_traversal_at_every_operation() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8080").unwrap();
        assert!(store.upload("../escape", vec![], "text/plain").await.is_err());
        assert!(store.download("../escape").await.is_err());
        assert!(store.exists("../escape").await.is_err());
    }
}
