//! Storage abstraction trait

use crate::StorageBackend;
use vidframe_core::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            StorageError::InvalidKey(key) => AppError::InvalidInput(format!("Invalid storage key: {}", key)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Object store capability shared by the gateway, the worker and the sweeper.
///
/// Keys are plain strings using `/` as separator (see the crate root for the layout).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` at `key`, replacing any existing object
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Read a whole object into memory
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Stream an object into a local file and return the number of bytes written
    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<u64>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Every key starting with `prefix`, sorted lexicographically
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Time-limited GET URL for direct client downloads
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    fn backend_type(&self) -> StorageBackend;
}
