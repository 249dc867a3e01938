//! PostgreSQL table queue
//!
//! Messages live in `queue_messages`. A receive claims one row with
//! `FOR UPDATE SKIP LOCKED` and hides it for the visibility timeout; an
//! unsettled claim (crashed consumer) becomes visible again once it lapses.
//! Publishers `NOTIFY` on [`QUEUE_NOTIFY_CHANNEL`] so idle consumers wake
//! without waiting for their next poll.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::broker::{Delivery, MessageQueue, QueueError, QueueResult};

/// Channel name for PostgreSQL LISTEN/NOTIFY when a message is published.
pub const QUEUE_NOTIFY_CHANNEL: &str = "vidframe_queue";

#[derive(sqlx::FromRow)]
struct ClaimedRow {
    id: i64,
    queue: String,
    payload: String,
    delivery_count: i32,
}

#[derive(Clone)]
pub struct PgMessageQueue {
    pool: PgPool,
    visibility_timeout: Duration,
    wake: Arc<Notify>,
}

impl PgMessageQueue {
    pub fn new(pool: PgPool, visibility_timeout: Duration) -> Self {
        Self {
            pool,
            visibility_timeout,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Spawn the LISTEN task that wakes waiting receivers. Consumers call this;
    /// publish-only processes do not need it.
    pub fn start_listener(&self) -> tokio::task::JoinHandle<()> {
        let pool = self.pool.clone();
        let wake = self.wake.clone();
        tokio::spawn(async move {
            loop {
                match sqlx::postgres::PgListener::connect_with(&pool).await {
                    Ok(mut listener) => {
                        if let Err(e) = listener.listen(QUEUE_NOTIFY_CHANNEL).await {
                            tracing::warn!(error = %e, "LISTEN failed, will retry");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            continue;
                        }
                        while listener.recv().await.is_ok() {
                            wake.notify_waiters();
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "PgListener connect failed, will retry");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        })
    }

    async fn claim(&self, queue: &str) -> QueueResult<Option<Delivery>> {
        let row = sqlx::query_as::<_, ClaimedRow>(
            r#"
            UPDATE queue_messages
            SET delivery_count = delivery_count + 1,
                locked_until = NOW() + make_interval(secs => $2)
            WHERE id = (
                SELECT id FROM queue_messages
                WHERE queue = $1
                  AND dead_lettered_at IS NULL
                  AND available_at <= NOW()
                  AND (locked_until IS NULL OR locked_until < NOW())
                ORDER BY available_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, queue, payload::text AS payload, delivery_count
            "#,
        )
        .bind(queue)
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Delivery {
            queue: row.queue,
            body: row.payload,
            delivery_count: row.delivery_count,
            receipt: row.id.to_string(),
        }))
    }

    fn message_id(delivery: &Delivery) -> QueueResult<i64> {
        delivery
            .receipt
            .parse()
            .map_err(|_| QueueError::UnknownDelivery(delivery.receipt.clone()))
    }
}

#[async_trait]
impl MessageQueue for PgMessageQueue {
    #[tracing::instrument(skip(self, body))]
    async fn publish(&self, queue: &str, body: &str) -> QueueResult<()> {
        // Reject malformed bodies here rather than as a cast error from the database
        serde_json::from_str::<serde::de::IgnoredAny>(body)?;

        sqlx::query("INSERT INTO queue_messages (queue, payload) VALUES ($1, $2::jsonb)")
            .bind(queue)
            .bind(body)
            .execute(&self.pool)
            .await?;

        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(QUEUE_NOTIFY_CHANNEL)
            .bind(queue)
            .execute(&self.pool)
            .await
        {
            // Consumers still find the row on their next poll
            tracing::debug!(error = %e, queue = %queue, "pg_notify failed");
        }

        Ok(())
    }

    async fn receive(&self, queue: &str, wait: Duration) -> QueueResult<Option<Delivery>> {
        if let Some(delivery) = self.claim(queue).await? {
            return Ok(Some(delivery));
        }

        tokio::select! {
            _ = self.wake.notified() => {}
            _ = tokio::time::sleep(wait) => {}
        }

        self.claim(queue).await
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let id = Self::message_id(delivery)?;
        sqlx::query("DELETE FROM queue_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, delay: Duration, reason: &str) -> QueueResult<()> {
        let id = Self::message_id(delivery)?;
        sqlx::query(
            r#"
            UPDATE queue_messages
            SET locked_until = NULL,
                available_at = NOW() + make_interval(secs => $2),
                last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(delay.as_secs_f64())
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        let id = Self::message_id(delivery)?;
        sqlx::query(
            r#"
            UPDATE queue_messages
            SET dead_lettered_at = NOW(), locked_until = NULL, last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
