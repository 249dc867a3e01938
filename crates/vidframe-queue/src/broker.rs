//! Broker capability and delivery types

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use vidframe_core::{AppError, TaskError};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Message serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue configuration error: {0}")]
    Config(String),

    #[error("Unknown delivery: {0}")]
    UnknownDelivery(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::Queue(err.to_string())
    }
}

/// A message handed to a consumer. It stays invisible to other consumers until
/// it is acknowledged, negatively acknowledged or dead-lettered.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub queue: String,
    pub body: String,
    /// 1 on first delivery, incremented on every redelivery
    pub delivery_count: i32,
    /// Backend handle used to settle the delivery
    pub receipt: String,
}

impl Delivery {
    /// Decode the body. A malformed body can never succeed, so it is unrecoverable.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        serde_json::from_str(&self.body).map_err(|e| {
            TaskError::unrecoverable(anyhow::anyhow!(
                "malformed message on {}: {}",
                self.queue,
                e
            ))
        })
    }
}

/// Durable at-least-once point-to-point queue
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, queue: &str, body: &str) -> QueueResult<()>;

    /// Next available message, waiting up to `wait` for one to arrive
    async fn receive(&self, queue: &str, wait: Duration) -> QueueResult<Option<Delivery>>;

    /// Settle successfully; the message is gone for good
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Return the message for redelivery after `delay`
    async fn nack(&self, delivery: &Delivery, delay: Duration, reason: &str) -> QueueResult<()>;

    /// Park the message where it will not be redelivered
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()>;
}

/// Typed publishing on top of [`MessageQueue`]
#[async_trait]
pub trait MessageQueueExt {
    async fn publish_json<T: Serialize + Sync>(&self, queue: &str, message: &T) -> QueueResult<()>;
}

#[async_trait]
impl<Q: MessageQueue + ?Sized> MessageQueueExt for Q {
    async fn publish_json<T: Serialize + Sync>(&self, queue: &str, message: &T) -> QueueResult<()> {
        let body = serde_json::to_string(message)?;
        self.publish(queue, &body).await
    }
}

/// Processes one delivery. The consume loop settles the message from the result.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<(), TaskError>;
}
