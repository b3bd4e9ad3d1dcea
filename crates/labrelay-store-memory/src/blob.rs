use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use labrelay_store::{BlobStore, StoreError};

const URL_PREFIX: &str = "memory://";

/// Blob store backed by a map from path to bytes. Upload returns a
/// `memory://` URL; re-uploading the same path overwrites, which matches the
/// idempotent re-run contract.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a blob and returns its URL, for test setup.
    pub async fn seed(&self, path: &str, bytes: Vec<u8>) -> String {
        let mut blobs = self.blobs.write().await;
        blobs.insert(path.to_string(), bytes);
        format!("{URL_PREFIX}{path}")
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn download(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        let path = url.strip_prefix(URL_PREFIX).unwrap_or(url);
        let blobs = self.blobs.read().await;
        blobs
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("blob {url}")))
    }

    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, StoreError> {
        let mut blobs = self.blobs.write().await;
        blobs.insert(path.to_string(), bytes.to_vec());
        Ok(format!("{URL_PREFIX}{path}"))
    }
}
