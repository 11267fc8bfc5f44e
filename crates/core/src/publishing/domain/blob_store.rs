use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("upload of '{key}' failed: {message}")]
pub struct BlobStoreError {
    pub key: String,
    pub message: String,
}

/// Remote key/value blob storage.
///
/// One attempt per call; implementations do not retry.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `body` under `key` as a publicly readable object.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BlobStoreError>;
}
