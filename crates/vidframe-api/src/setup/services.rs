//! Gateway composition root

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use vidframe_core::Config;
use vidframe_db::PgVideoRepository;
use vidframe_processing::{ArchiveBuilder, UploadValidator};
use vidframe_queue::MessageQueue;
use vidframe_services::{AdmissionConfig, UploadAdmission, VideoCatalog};
use vidframe_storage::Storage;

use crate::auth::{InternalKey, JwtValidator};
use crate::state::AppState;

pub fn upload_validator(config: &Config) -> UploadValidator {
    UploadValidator::new(
        config.max_video_size_bytes(),
        config.video_allowed_extensions().to_vec(),
    )
}

pub fn admission_config(config: &Config) -> AdmissionConfig {
    AdmissionConfig {
        fps: config.frame_rate(),
        retention: chrono::Duration::days(config.retention_days()),
    }
}

pub fn gateway_state(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
    queue: Arc<dyn MessageQueue>,
) -> Result<Arc<AppState>> {
    let jwt_secret = config.jwt_secret().context("JWT_SECRET must be set")?;
    let videos = Arc::new(PgVideoRepository::new(pool.clone()));

    let admission = UploadAdmission::new(
        videos.clone(),
        storage.clone(),
        queue,
        upload_validator(config),
        admission_config(config),
        tracing::info_span!("upload_admission"),
    );

    if config.internal_api_key().is_none() {
        tracing::warn!("INTERNAL_API_KEY is not set; internal routes are unauthenticated");
    }

    Ok(Arc::new(AppState {
        admission: Arc::new(admission),
        catalog: VideoCatalog::new(videos, storage.clone()),
        archives: ArchiveBuilder::new(storage),
        jwt: Arc::new(JwtValidator::new(jwt_secret)),
        internal_key: InternalKey::new(config.internal_api_key()),
        pool: Some(pool),
    }))
}
