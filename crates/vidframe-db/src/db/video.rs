use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use vidframe_core::{AppError, Video, VideoStatus};

/// Result of trying to take a video into processing
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The row moved to PROCESSING and belongs to this attempt
    Claimed(Video),
    /// No such video (deleted by the sweeper or never admitted)
    Missing,
    /// Already COMPLETED or FAILED; a redelivered job must not touch it
    Finished(Video),
    /// Another attempt holds a live lease on the row
    InProgress(Video),
}

/// Durable record of the video lifecycle
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn create(&self, video: &Video) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError>;

    /// Videos owned by `user_id`, newest first
    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64)
        -> Result<Vec<Video>, AppError>;

    async fn count_by_user(&self, user_id: i64) -> Result<i64, AppError>;

    /// Move a PENDING video (or a PROCESSING one whose lease has expired) to PROCESSING.
    async fn claim_for_processing(&self, id: Uuid, lease: Duration)
        -> Result<ClaimOutcome, AppError>;

    /// PROCESSING -> COMPLETED. Returns false when the row was not PROCESSING.
    async fn mark_completed(
        &self,
        id: Uuid,
        frame_count: i32,
        archive_key: &str,
    ) -> Result<bool, AppError>;

    /// PROCESSING -> FAILED. Returns false when the row was not PROCESSING.
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool, AppError>;

    /// Videos whose `expires_at` is at or before `now`
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Video>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

const VIDEO_COLUMNS: &str = r#"
    id, user_id, filename, source_key, status, fps, frame_count, archive_key,
    error_message, created_at, started_at, completed_at, expires_at
"#;

/// PostgreSQL-backed [`VideoRepository`]
#[derive(Clone)]
pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    #[tracing::instrument(skip(self, video), fields(video_id = %video.id, user_id = video.user_id))]
    async fn create(&self, video: &Video) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO videos (
                id, user_id, filename, source_key, status, fps,
                created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(video.id)
        .bind(video.user_id)
        .bind(&video.filename)
        .bind(&video.source_key)
        .bind(video.status)
        .bind(video.fps)
        .bind(video.created_at)
        .bind(video.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {} FROM videos WHERE id = $1",
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Video>, AppError> {
        let videos = sqlx::query_as::<_, Video>(&format!(
            r#"
            SELECT {} FROM videos
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            VIDEO_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }

    #[tracing::instrument(skip(self))]
    async fn count_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(lease_secs = lease.num_seconds()))]
    async fn claim_for_processing(
        &self,
        id: Uuid,
        lease: Duration,
    ) -> Result<ClaimOutcome, AppError> {
        let claimed = sqlx::query_as::<_, Video>(&format!(
            r#"
            UPDATE videos
            SET status = 'PROCESSING', started_at = NOW()
            WHERE id = $1
              AND (
                status = 'PENDING'
                OR (status = 'PROCESSING'
                    AND (started_at IS NULL OR started_at < NOW() - make_interval(secs => $2)))
              )
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(id)
        .bind(lease.num_seconds() as f64)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(video) = claimed {
            return Ok(ClaimOutcome::Claimed(video));
        }

        Ok(match self.get(id).await? {
            None => ClaimOutcome::Missing,
            Some(video) if video.status.is_terminal() => ClaimOutcome::Finished(video),
            Some(video) => ClaimOutcome::InProgress(video),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn mark_completed(
        &self,
        id: Uuid,
        frame_count: i32,
        archive_key: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'COMPLETED', frame_count = $2, archive_key = $3,
                error_message = NULL, completed_at = NOW()
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .bind(frame_count)
        .bind(archive_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, error_message))]
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = 'FAILED', error_message = $2,
                frame_count = NULL, archive_key = NULL
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Video>, AppError> {
        let videos = sqlx::query_as::<_, Video>(&format!(
            "SELECT {} FROM videos WHERE expires_at <= $1 ORDER BY expires_at",
            VIDEO_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Shared status-transition rules, used by the in-memory repository
pub(crate) fn can_claim(video: &Video, lease: Duration, now: DateTime<Utc>) -> bool {
    match video.status {
        VideoStatus::Pending => true,
        VideoStatus::Processing => video
            .started_at
            .map(|started| started < now - lease)
            .unwrap_or(true),
        VideoStatus::Completed | VideoStatus::Failed => false,
    }
}
