//! Azure Blob-backed `DocumentStore`, using `object_store`'s Azure backend
//! and its native pre-signed URL signer (spec §4.1 "cloud blob service
//! with native pre-signed URL generation").

use super::{validate_key, DocumentStore, Result, StorageError};
use async_trait::async_trait;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as StorePath;
use object_store::signer::Signer;
use object_store::ObjectStore;
use std::time::Duration;

pub struct CloudObjectStore {
    store: object_store::azure::MicrosoftAzure,
}

impl CloudObjectStore {
    pub fn new(connection_string: &str, container_name: &str) -> Result<Self> {
        let store = MicrosoftAzureBuilder::new()
            .with_container_name(container_name)
            .with_config_from_connection_string(connection_string)
            .map_err(|e| StorageError::Backend(e))?
            .build()
            .map_err(StorageError::Backend)?;
        Ok(Self { store })
    }
}

#[async_trait]
impl DocumentStore for CloudObjectStore {
    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        validate_key(key)?;
        let path = StorePath::from(key);
        let size = data.len();
        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        tracing::info!(key, size, "uploaded object to Azure Blob store");
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

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String> {
        validate_key(key)?;
        let path = StorePath::from(key);
        let url = self
            .store
            .signed_url(http::Method::GET, &path, ttl)
            .await
            .map_err(|e| StorageError::Backend(e))?;
        Ok(url.to_string())
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
