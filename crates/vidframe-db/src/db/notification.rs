use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use vidframe_core::{AppError, NewNotification, Notification};

/// Log of notification delivery attempts
///
/// A record is created `PENDING` and moves once to `SENT` or `FAILED`. Both
/// updates are conditional on the record still being `PENDING`, so a terminal
/// status is never overwritten.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, new: NewNotification) -> Result<Notification, AppError>;

    async fn mark_sent(&self, id: i64) -> Result<bool, AppError>;

    async fn mark_failed(&self, id: i64, error_message: &str) -> Result<bool, AppError>;

    async fn list_by_video(&self, video_id: Uuid) -> Result<Vec<Notification>, AppError>;
}

const NOTIFICATION_COLUMNS: &str = r#"
    id, user_id, video_id, channel, status, recipient, subject,
    error_message, sent_at, created_at
"#;

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    #[tracing::instrument(skip(self, new), fields(user_id = new.user_id))]
    async fn create(&self, new: NewNotification) -> Result<Notification, AppError> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notification_log (user_id, video_id, channel, status, recipient, subject)
            VALUES ($1, $2, $3, 'PENDING', $4, $5)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(new.user_id)
        .bind(new.video_id)
        .bind(new.channel)
        .bind(&new.recipient)
        .bind(&new.subject)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_sent(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_log
            SET status = 'SENT', sent_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, error_message))]
    async fn mark_failed(&self, id: i64, error_message: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_log
            SET status = 'FAILED', error_message = $2
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_video(&self, video_id: Uuid) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {} FROM notification_log WHERE video_id = $1 ORDER BY id",
            NOTIFICATION_COLUMNS
        ))
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
