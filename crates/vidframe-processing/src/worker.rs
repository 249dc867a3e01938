//! Frame-extraction worker: fetch → extract → upload frames → archive → finalize.
//!
//! The claim on the video row is the delivery fence. A redelivered job for a
//! finished video is acknowledged without touching anything; one for a video
//! another attempt is still processing (inside the lease) is handed back to
//! the queue.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::Instrument;

use vidframe_core::constants::NOTIFICATION_QUEUE;
use vidframe_core::{ProcessingJob, TaskError, Video, VideoEvent};
use vidframe_db::{ClaimOutcome, VideoRepository};
use vidframe_queue::{Delivery, MessageHandler, MessageQueue, MessageQueueExt};
use vidframe_storage::{keys, Storage};

use crate::archive::ArchiveBuilder;
use crate::extractor::FrameExtractor;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long a PROCESSING claim is honoured before another delivery may take over
    pub lease: chrono::Duration,
    /// Assemble the frames archive before completing
    pub build_archive: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            lease: chrono::Duration::seconds(3600),
            build_archive: true,
        }
    }
}

/// Output of a successful run, before it is recorded
struct Extracted {
    frame_count: i32,
    archive_key: String,
}

pub struct FrameExtractionWorker {
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
    queue: Arc<dyn MessageQueue>,
    extractor: Arc<dyn FrameExtractor>,
    archive: ArchiveBuilder,
    config: WorkerConfig,
    span: tracing::Span,
}

impl FrameExtractionWorker {
    pub fn new(
        videos: Arc<dyn VideoRepository>,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn MessageQueue>,
        extractor: Arc<dyn FrameExtractor>,
        config: WorkerConfig,
        span: tracing::Span,
    ) -> Self {
        let archive = ArchiveBuilder::new(storage.clone());
        Self {
            videos,
            storage,
            queue,
            extractor,
            archive,
            config,
            span,
        }
    }

    /// Run one job to a terminal state
    pub async fn process_job(&self, job: &ProcessingJob) -> Result<(), TaskError> {
        let span = tracing::info_span!(parent: &self.span, "process_video", video_id = %job.video_id);
        self.process_job_inner(job).instrument(span).await
    }

    async fn process_job_inner(&self, job: &ProcessingJob) -> Result<(), TaskError> {
        let claim = self
            .videos
            .claim_for_processing(job.video_id, self.config.lease)
            .await
            .map_err(|e| TaskError::recoverable(anyhow!(e).context("Failed to claim video")))?;

        let video = match claim {
            ClaimOutcome::Claimed(video) => video,
            ClaimOutcome::Missing => {
                return Err(TaskError::unrecoverable(anyhow!(
                    "video not found: {}",
                    job.video_id
                )));
            }
            ClaimOutcome::Finished(video) => {
                tracing::info!(status = %video.status, "Duplicate delivery for finished video, skipping");
                return Ok(());
            }
            ClaimOutcome::InProgress(_) => {
                return Err(TaskError::recoverable(anyhow!(
                    "video {} is being processed by another worker",
                    job.video_id
                )));
            }
        };

        tracing::info!(fps = video.fps, source_key = %job.s3_key, "Video processing started");

        match self.run(&video, job).await {
            Ok(extracted) => self.finalize(&video, extracted).await,
            Err(e) => self.fail(&video, e).await,
        }
    }

    /// Fetch, extract, upload frames and build the archive. The scratch
    /// directory is removed when this returns.
    async fn run(&self, video: &Video, job: &ProcessingJob) -> Result<Extracted> {
        let scratch = TempDir::new().context("Failed to create temp directory")?;

        let input_name = match keys::base_name(&job.s3_key) {
            "" => "input",
            name => name,
        };
        let input_path = scratch.path().join(input_name);
        let bytes = self
            .storage
            .download_to_file(&job.s3_key, &input_path)
            .await
            .with_context(|| format!("Failed to download source video {}", job.s3_key))?;
        tracing::debug!(bytes, "Source video downloaded");

        let frames_dir = scratch.path().join("frames");
        let frames = self
            .extractor
            .extract(&input_path, &frames_dir, video.fps)
            .await
            .context("Frame extraction failed")?;

        for frame in &frames {
            let name = frame
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("Invalid frame path: {}", frame.display()))?;
            let data = tokio::fs::read(frame)
                .await
                .with_context(|| format!("Failed to read frame {}", name))?;
            self.storage
                .put(&keys::frame_key(video.id, name), Bytes::from(data))
                .await
                .with_context(|| format!("Failed to upload frame {}", name))?;
        }
        tracing::info!(frame_count = frames.len(), "Frames uploaded");

        let archive_key = keys::archive_key(video.id, &video.filename);
        if self.config.build_archive {
            self.archive
                .build(&keys::frames_prefix(video.id), &archive_key)
                .await
                .context("Failed to build frames archive")?;
        }

        let frame_count =
            i32::try_from(frames.len()).context("Frame count does not fit the record")?;
        Ok(Extracted {
            frame_count,
            archive_key,
        })
    }

    async fn finalize(&self, video: &Video, extracted: Extracted) -> Result<(), TaskError> {
        let updated = match self
            .videos
            .mark_completed(video.id, extracted.frame_count, &extracted.archive_key)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                return self
                    .fail(video, anyhow!(e).context("Failed to record completion"))
                    .await
            }
        };

        if !updated {
            tracing::info!("Video already finalized by another attempt");
            return Ok(());
        }

        tracing::info!(
            frame_count = extracted.frame_count,
            archive_key = %extracted.archive_key,
            "Video processing completed"
        );
        self.publish_event(VideoEvent::completed(
            video.id,
            video.user_id,
            extracted.frame_count,
        ))
        .await;
        Ok(())
    }

    /// Record FAILED, announce it, and reject the message
    async fn fail(&self, video: &Video, err: anyhow::Error) -> Result<(), TaskError> {
        let message = format!("{:#}", err);
        tracing::error!(error = %message, "Video processing failed");

        match self.videos.mark_failed(video.id, &message).await {
            Ok(true) => {
                self.publish_event(VideoEvent::failed(video.id, Some(video.user_id), &message))
                    .await;
            }
            Ok(false) => {
                tracing::info!("Video already finalized by another attempt, not marking failed");
            }
            Err(e) => {
                // The row stays PROCESSING; a redelivery reclaims it once the lease lapses
                tracing::error!(error = %e, "Failed to record processing failure");
                return Err(TaskError::recoverable(
                    err.context(format!("failed to record failure: {}", e)),
                ));
            }
        }

        Err(TaskError::unrecoverable(err))
    }

    async fn publish_event(&self, event: VideoEvent) {
        if let Err(e) = self.queue.publish_json(NOTIFICATION_QUEUE, &event).await {
            tracing::warn!(error = %e, status = %event.status, "Failed to publish video event");
        }
    }
}

#[async_trait]
impl MessageHandler for FrameExtractionWorker {
    async fn handle(&self, delivery: &Delivery) -> Result<(), TaskError> {
        let job: ProcessingJob = delivery.decode()?;
        self.process_job(&job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ScriptedFrameExtractor;
    use chrono::Utc;
    use uuid::Uuid;
    use vidframe_core::VideoStatus;
    use vidframe_db::InMemoryVideoRepository;
    use vidframe_queue::InMemoryQueue;
    use vidframe_storage::LocalStorage;

    struct Harness {
        _dir: tempfile::TempDir,
        videos: Arc<InMemoryVideoRepository>,
        storage: Arc<dyn Storage>,
        queue: Arc<InMemoryQueue>,
    }

    impl Harness {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let storage = LocalStorage::new(dir.path(), "http://localhost/media".to_string())
                .await
                .unwrap();
            Self {
                _dir: dir,
                videos: Arc::new(InMemoryVideoRepository::new()),
                storage: Arc::new(storage),
                queue: Arc::new(InMemoryQueue::new()),
            }
        }

        fn worker(&self, extractor: ScriptedFrameExtractor, config: WorkerConfig) -> FrameExtractionWorker {
            FrameExtractionWorker::new(
                self.videos.clone(),
                self.storage.clone(),
                self.queue.clone(),
                Arc::new(extractor),
                config,
                tracing::Span::none(),
            )
        }

        /// Admit a video the way the gateway does and return its job
        async fn admit(&self, upload_source: bool) -> ProcessingJob {
            let id = Uuid::new_v4();
            let key = keys::upload_key(id, "clip.mp4");
            if upload_source {
                self.storage
                    .put(&key, Bytes::from_static(b"fake video"))
                    .await
                    .unwrap();
            }
            let video = Video::new_pending(
                id,
                7,
                "clip.mp4".to_string(),
                key.clone(),
                1,
                chrono::Duration::days(15),
                Utc::now(),
            );
            self.videos.create(&video).await.unwrap();
            ProcessingJob {
                video_id: id,
                user_id: 7,
                s3_key: key,
                filename: "clip.mp4".to_string(),
            }
        }

        async fn events(&self) -> Vec<VideoEvent> {
            self.queue
                .pending(NOTIFICATION_QUEUE)
                .await
                .iter()
                .map(|body| serde_json::from_str(body).unwrap())
                .collect()
        }
    }

    fn delivery(job: &ProcessingJob) -> Delivery {
        Delivery {
            queue: "video.processing.queue".to_string(),
            body: serde_json::to_string(job).unwrap(),
            delivery_count: 1,
            receipt: "0".to_string(),
        }
    }

    #[tokio::test]
    async fn completes_video_and_announces_it() {
        let h = Harness::new().await;
        let job = h.admit(true).await;
        let worker = h.worker(ScriptedFrameExtractor::producing(42), WorkerConfig::default());

        worker.handle(&delivery(&job)).await.unwrap();

        let video = h.videos.get(job.video_id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Completed);
        assert_eq!(video.frame_count, Some(42));
        let archive_key = keys::archive_key(job.video_id, "clip.mp4");
        assert_eq!(video.archive_key.as_deref(), Some(archive_key.as_str()));
        assert!(video.completed_at.is_some());
        assert!(video.error_message.is_none());

        let frames = h.storage.list(&keys::frames_prefix(job.video_id)).await.unwrap();
        assert_eq!(frames.len(), 42);
        assert!(h.storage.exists(&archive_key).await.unwrap());

        let events = h.events().await;
        assert_eq!(events, vec![VideoEvent::completed(job.video_id, 7, 42)]);
    }

    #[tokio::test]
    async fn redelivery_after_completion_is_a_no_op() {
        let h = Harness::new().await;
        let job = h.admit(true).await;
        let worker = h.worker(ScriptedFrameExtractor::producing(2), WorkerConfig::default());

        worker.handle(&delivery(&job)).await.unwrap();
        let first = h.videos.get(job.video_id).await.unwrap().unwrap();

        worker.handle(&delivery(&job)).await.unwrap();
        let second = h.videos.get(job.video_id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(h.events().await.len(), 1);
    }

    #[tokio::test]
    async fn extraction_failure_marks_failed_and_rejects() {
        let h = Harness::new().await;
        let job = h.admit(true).await;
        let worker = h.worker(
            ScriptedFrameExtractor::failing("Invalid data found when processing input"),
            WorkerConfig::default(),
        );

        let err = worker.handle(&delivery(&job)).await.unwrap_err();
        assert!(!err.is_recoverable());

        let video = h.videos.get(job.video_id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Failed);
        assert!(video.frame_count.is_none());
        assert!(video.archive_key.is_none());
        let message = video.error_message.unwrap();
        assert!(message.contains("Frame extraction failed"));

        let events = h.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, VideoStatus::Failed);
        assert_eq!(events[0].user_id, Some(7));
        assert_eq!(events[0].error_message.as_deref(), Some(message.as_str()));
    }

    #[tokio::test]
    async fn missing_source_object_marks_failed() {
        let h = Harness::new().await;
        let job = h.admit(false).await;
        let worker = h.worker(ScriptedFrameExtractor::producing(1), WorkerConfig::default());

        let err = worker.handle(&delivery(&job)).await.unwrap_err();
        assert!(!err.is_recoverable());
        let video = h.videos.get(job.video_id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Failed);
        assert!(video
            .error_message
            .unwrap()
            .contains("Failed to download source video"));
    }

    #[tokio::test]
    async fn unknown_video_is_rejected_without_event() {
        let h = Harness::new().await;
        let job = ProcessingJob {
            video_id: Uuid::new_v4(),
            user_id: 7,
            s3_key: "uploads/x/clip.mp4".to_string(),
            filename: "clip.mp4".to_string(),
        };
        let worker = h.worker(ScriptedFrameExtractor::producing(1), WorkerConfig::default());

        let err = worker.handle(&delivery(&job)).await.unwrap_err();
        assert!(!err.is_recoverable());
        assert!(h.events().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_claim_inside_lease_is_requeued() {
        let h = Harness::new().await;
        let job = h.admit(true).await;
        h.videos
            .claim_for_processing(job.video_id, chrono::Duration::seconds(3600))
            .await
            .unwrap();
        let worker = h.worker(ScriptedFrameExtractor::producing(1), WorkerConfig::default());

        let err = worker.handle(&delivery(&job)).await.unwrap_err();
        assert!(err.is_recoverable());
        let video = h.videos.get(job.video_id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Processing);
        assert!(h.storage.list(&keys::frames_prefix(job.video_id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn database_outage_at_claim_is_recoverable_and_changes_nothing() {
        let h = Harness::new().await;
        let job = h.admit(true).await;
        h.videos.set_unavailable(true);
        let worker = h.worker(ScriptedFrameExtractor::producing(1), WorkerConfig::default());

        let err = worker.handle(&delivery(&job)).await.unwrap_err();
        assert!(err.is_recoverable());

        h.videos.set_unavailable(false);
        let video = h.videos.get(job.video_id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Pending);
        assert!(h.events().await.is_empty());
    }

    #[tokio::test]
    async fn archive_can_be_left_to_a_separate_step() {
        let h = Harness::new().await;
        let job = h.admit(true).await;
        let worker = h.worker(
            ScriptedFrameExtractor::producing(3),
            WorkerConfig {
                build_archive: false,
                ..WorkerConfig::default()
            },
        );

        worker.handle(&delivery(&job)).await.unwrap();
        let video = h.videos.get(job.video_id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Completed);
        let archive_key = video.archive_key.unwrap();
        assert!(!h.storage.exists(&archive_key).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_message_is_unrecoverable() {
        let h = Harness::new().await;
        let worker = h.worker(ScriptedFrameExtractor::producing(1), WorkerConfig::default());
        let bad = Delivery {
            queue: "video.processing.queue".to_string(),
            body: "not json".to_string(),
            delivery_count: 1,
            receipt: "0".to_string(),
        };
        let err = worker.handle(&bad).await.unwrap_err();
        assert!(!err.is_recoverable());
    }
}
