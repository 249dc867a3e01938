use crate::keys;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// For development and tests. Nothing in vidframe serves `base_url`, and
/// [`Storage::presigned_get_url`] only appends the requested lifetime as an
/// `expires_in` query parameter: the link is unsigned and never expires.
/// Whatever serves the directory (a static file server in development) is
/// responsible for access control. Deployments use the S3 backend.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for objects (e.g. "/var/lib/vidframe/objects")
    /// * `base_url` - Base URL the directory is served from (e.g. "http://localhost:8080/files")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert a key to a filesystem path, rejecting keys that escape the base directory
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        keys::check_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        Ok(Bytes::from(data))
    }

    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let start = std::time::Instant::now();
        let written = fs::copy(&path, dest).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to copy file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download to file successful"
        );

        Ok(written)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(key = %key, "Local storage delete successful");

        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix_path = self.key_to_path(prefix)?;
        // Walk from the deepest directory the prefix names; filter on the full prefix after
        let root = if prefix.is_empty() || prefix.ends_with('/') {
            prefix_path
        } else {
            prefix_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.base_path.clone())
        };

        if !fs::try_exists(&root).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::ListFailed(format!("{}: {}", dir.display(), e)))?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.path_to_key(&path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Plain `{base_url}/{key}` link. `expires_in` is informational only.
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.key_to_path(key)?;
        Ok(format!(
            "{}/{}?expires_in={}",
            self.base_url.trim_end_matches('/'),
            key,
            expires_in.as_secs()
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
