//! Zip archives of everything stored under a key prefix

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use vidframe_core::AppError;
use vidframe_storage::keys::base_name;
use vidframe_storage::{Storage, StorageError};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no content found for prefix: {0}")]
    NoContent(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NoContent(_) => AppError::NoContent(err.to_string()),
            ArchiveError::Storage(e) => AppError::Storage(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    /// Key the archive was uploaded to
    pub zip_path: String,
    pub file_count: usize,
    pub zip_size_bytes: u64,
}

#[derive(Clone)]
pub struct ArchiveBuilder {
    storage: Arc<dyn Storage>,
}

impl ArchiveBuilder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Zip every object under `prefix` and upload the archive to `output_key`.
    ///
    /// Entries are named by the object's base name and written in key order.
    /// Objects whose base name is empty or already taken are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn build(&self, prefix: &str, output_key: &str) -> Result<ArchiveResult, ArchiveError> {
        let keys = self.storage.list(prefix).await?;
        if keys.is_empty() {
            return Err(ArchiveError::NoContent(prefix.to_string()));
        }

        let mut buffer = Vec::new();
        let mut seen = HashSet::new();
        {
            let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
            let options = FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(0o644);

            for key in &keys {
                let name = base_name(key);
                if name.is_empty() || !seen.insert(name.to_string()) {
                    tracing::warn!(key = %key, "Skipping object with empty or duplicate entry name");
                    continue;
                }

                let data = self.storage.get(key).await?;
                zip.start_file(name, options)?;
                zip.write_all(&data)?;
            }

            zip.finish()?;
        }

        if seen.is_empty() {
            return Err(ArchiveError::NoContent(prefix.to_string()));
        }

        let zip_size_bytes = buffer.len() as u64;
        self.storage.put(output_key, Bytes::from(buffer)).await?;

        tracing::info!(
            prefix = %prefix,
            output_key = %output_key,
            file_count = seen.len(),
            zip_size_bytes,
            "Archive created"
        );

        Ok(ArchiveResult {
            zip_path: output_key.to_string(),
            file_count: seen.len(),
            zip_size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use vidframe_storage::LocalStorage;

    async fn storage() -> (tempfile::TempDir, Arc<dyn Storage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost/media".to_string())
            .await
            .unwrap();
        (dir, Arc::new(storage))
    }

    #[tokio::test]
    async fn archives_every_object_by_base_name() {
        let (_dir, storage) = storage().await;
        for n in [2, 1, 3] {
            storage
                .put(
                    &format!("processed/v1/frames/frame_{:04}.jpg", n),
                    Bytes::from(format!("frame {}", n)),
                )
                .await
                .unwrap();
        }

        let result = ArchiveBuilder::new(storage.clone())
            .build("processed/v1/frames/", "processed/v1/clip.mp4.zip")
            .await
            .unwrap();
        assert_eq!(result.file_count, 3);
        assert_eq!(result.zip_path, "processed/v1/clip.mp4.zip");

        let bytes = storage.get("processed/v1/clip.mp4.zip").await.unwrap();
        assert_eq!(result.zip_size_bytes, bytes.len() as u64);

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
        let names: Vec<String> = archive.file_names().map(String::from).collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| !n.contains('/')));

        let mut content = String::new();
        archive
            .by_name("frame_0002.jpg")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "frame 2");
    }

    #[tokio::test]
    async fn empty_prefix_is_no_content() {
        let (_dir, storage) = storage().await;
        let err = ArchiveBuilder::new(storage.clone())
            .build("processed/none/frames/", "processed/none/x.zip")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no content found for prefix: processed/none/frames/"
        );
        assert!(matches!(AppError::from(err), AppError::NoContent(_)));
        assert!(!storage.exists("processed/none/x.zip").await.unwrap());
    }
}
