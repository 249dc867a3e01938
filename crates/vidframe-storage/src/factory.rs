//! Backend selection from `STORAGE_BACKEND`

#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use vidframe_core::Config;

fn missing(setting: &str, backend: StorageBackend) -> StorageError {
    StorageError::ConfigError(format!("{} is required for the {} backend", setting, backend))
}

#[cfg(feature = "storage-s3")]
async fn open_s3(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let bucket = config
        .s3_bucket()
        .ok_or_else(|| missing("S3_BUCKET", StorageBackend::S3))?;
    // S3_REGION wins; AWS_REGION is what the SDK tooling usually exports
    let region = config
        .s3_region()
        .or(config.aws_region())
        .ok_or_else(|| missing("S3_REGION (or AWS_REGION)", StorageBackend::S3))?;

    let store = S3Storage::new(
        bucket.to_string(),
        region.to_string(),
        config.s3_endpoint().map(str::to_string),
    )
    .await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "storage-local")]
async fn open_local(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let root = config
        .local_storage_path()
        .ok_or_else(|| missing("LOCAL_STORAGE_PATH", StorageBackend::Local))?;
    let base_url = config
        .local_storage_base_url()
        .ok_or_else(|| missing("LOCAL_STORAGE_BASE_URL", StorageBackend::Local))?;

    if config.is_production() {
        tracing::warn!(
            root,
            "Local storage in production: download links are not signed and do not expire"
        );
    }

    let store = LocalStorage::new(root, base_url.to_string()).await?;
    Ok(Arc::new(store))
}

#[cfg(not(all(feature = "storage-s3", feature = "storage-local")))]
fn not_compiled_in(backend: StorageBackend, feature: &str) -> StorageError {
    StorageError::ConfigError(format!(
        "{} backend requested but this build lacks the `{}` feature",
        backend, feature
    ))
}

/// Open the object store named by `STORAGE_BACKEND`
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend();
    tracing::debug!(%backend, "Opening object store");

    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => open_s3(config).await,
        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(not_compiled_in(backend, "storage-s3")),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => open_local(config).await,
        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(not_compiled_in(backend, "storage-local")),
    }
}
