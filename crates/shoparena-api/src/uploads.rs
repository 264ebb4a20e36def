//! Profile image storage
//!
//! The object store takes a byte payload and a file name and answers with
//! the public URL the file can be fetched from.

use async_trait::async_trait;
use shoparena_core::StorageConfig;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Object store is not configured")]
    NotConfigured,

    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Object store rejected upload with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, UploadError>;
}

/// Build the object store from configuration
///
/// Without an upload URL every upload fails with [`UploadError::NotConfigured`].
pub fn from_config(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match &config.upload_url {
        Some(upload_url) => Arc::new(HttpObjectStore::new(
            upload_url.clone(),
            config.public_url.clone().unwrap_or_else(|| upload_url.clone()),
        )),
        None => Arc::new(DisabledObjectStore),
    }
}

/// Bucket reachable over plain HTTP `PUT {upload_url}/{filename}`
pub struct HttpObjectStore {
    client: reqwest::Client,
    upload_url: String,
    public_url: String,
}

impl HttpObjectStore {
    pub fn new(upload_url: String, public_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let response = self
            .client
            .put(format!("{}/{filename}", self.upload_url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UploadError::Rejected(response.status().as_u16()));
        }

        Ok(format!("{}/{filename}", self.public_url))
    }
}

struct DisabledObjectStore;

#[async_trait]
impl ObjectStore for DisabledObjectStore {
    async fn upload(&self, _: Vec<u8>, _: &str, _: &str) -> Result<String, UploadError> {
        Err(UploadError::NotConfigured)
    }
}

/// Keeps uploads in memory and serves them from a fake CDN prefix
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: tokio::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryObjectStore {
    pub const PUBLIC_PREFIX: &'static str = "https://cdn.shoparena.test";

    pub async fn get(&self, filename: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(filename).cloned()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        self.objects.lock().await.insert(filename.to_string(), bytes);
        Ok(format!("{}/{filename}", Self::PUBLIC_PREFIX))
    }
}
