//! Upload admission
//!
//! Store the object, record the video, queue the job. A failure after the
//! object is stored undoes what was already done so an upload leaves either all
//! three artifacts or none of them.

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use vidframe_core::constants::PROCESSING_QUEUE;
use vidframe_core::models::UploadVideoResponse;
use vidframe_core::{AppError, ProcessingJob, Video};
use vidframe_db::VideoRepository;
use vidframe_processing::UploadValidator;
use vidframe_queue::{MessageQueue, MessageQueueExt};
use vidframe_storage::{keys, Storage};

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Frames per second recorded on new videos
    pub fps: i32,
    pub retention: chrono::Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            fps: vidframe_core::constants::DEFAULT_FRAME_RATE,
            retention: chrono::Duration::days(vidframe_core::constants::DEFAULT_RETENTION_DAYS),
        }
    }
}

pub struct UploadAdmission {
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
    queue: Arc<dyn MessageQueue>,
    validator: UploadValidator,
    config: AdmissionConfig,
    span: tracing::Span,
}

impl UploadAdmission {
    pub fn new(
        videos: Arc<dyn VideoRepository>,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn MessageQueue>,
        validator: UploadValidator,
        config: AdmissionConfig,
        span: tracing::Span,
    ) -> Self {
        Self {
            videos,
            storage,
            queue,
            validator,
            config,
            span,
        }
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    /// Admit an upload. `declared_size` is the size the client announced; the
    /// larger of it and the received byte count is checked against the limit.
    pub async fn admit(
        &self,
        user_id: i64,
        filename: &str,
        declared_size: usize,
        data: Bytes,
    ) -> Result<UploadVideoResponse, AppError> {
        let span = tracing::info_span!(parent: &self.span, "admit_upload", user_id);
        self.admit_inner(user_id, filename, declared_size, data)
            .instrument(span)
            .await
    }

    async fn admit_inner(
        &self,
        user_id: i64,
        filename: &str,
        declared_size: usize,
        data: Bytes,
    ) -> Result<UploadVideoResponse, AppError> {
        let size = declared_size.max(data.len());
        let filename = self.validator.validate(filename, size)?;

        let video_id = Uuid::new_v4();
        let source_key = keys::upload_key(video_id, &filename);

        self.storage.put(&source_key, data).await?;

        let video = Video::new_pending(
            video_id,
            user_id,
            filename.clone(),
            source_key.clone(),
            self.config.fps,
            self.config.retention,
            Utc::now(),
        );

        if let Err(e) = self.videos.create(&video).await {
            tracing::error!(error = %e, video_id = %video_id, "Failed to record video, removing stored object");
            self.remove_object(&source_key).await;
            return Err(e);
        }

        let job = ProcessingJob {
            video_id,
            user_id,
            s3_key: source_key.clone(),
            filename: filename.clone(),
        };

        if let Err(e) = self.queue.publish_json(PROCESSING_QUEUE, &job).await {
            tracing::error!(error = %e, video_id = %video_id, "Failed to queue processing job, rolling back upload");
            match self.videos.delete(video_id).await {
                Ok(_) => {}
                Err(del) => {
                    tracing::warn!(error = %del, video_id = %video_id, "Failed to remove video record; retention sweep will reclaim it");
                }
            }
            self.remove_object(&source_key).await;
            return Err(e.into());
        }

        tracing::info!(
            video_id = %video_id,
            filename = %filename,
            size_bytes = size,
            "Video admitted"
        );

        Ok(UploadVideoResponse {
            video_id,
            filename,
            status: video.status,
        })
    }

    async fn remove_object(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!(error = %e, key = %key, "Failed to remove stored upload");
        }
    }
}
