//! AWS SQS backend
//!
//! Logical queue names map to queue URLs under a configured prefix, with dots
//! replaced by dashes (`video.processing.queue` becomes
//! `{prefix}/video-processing-queue`). Dead letters go to a sibling queue with a
//! `-dead-letter` suffix.

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use std::time::Duration;

use crate::broker::{Delivery, MessageQueue, QueueError, QueueResult};

/// Longest long-poll SQS accepts
const MAX_WAIT_SECS: u64 = 20;
/// Longest visibility timeout SQS accepts (12 hours)
const MAX_VISIBILITY_SECS: u64 = 43_200;

#[derive(Clone)]
pub struct SqsMessageQueue {
    client: Client,
    url_prefix: String,
}

impl SqsMessageQueue {
    pub fn new(client: Client, url_prefix: impl Into<String>) -> Self {
        Self {
            client,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a client from the default AWS credential chain
    pub async fn from_env(url_prefix: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), url_prefix)
    }

    pub fn queue_url(&self, queue: &str) -> String {
        format!("{}/{}", self.url_prefix, queue.replace('.', "-"))
    }

    fn dead_letter_url(&self, queue: &str) -> String {
        format!("{}-dead-letter", self.queue_url(queue))
    }

    async fn delete(&self, delivery: &Delivery) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(self.queue_url(&delivery.queue))
            .receipt_handle(&delivery.receipt)
            .send()
            .await
            .map_err(|e| backend("delete_message", e))?;
        Ok(())
    }
}

fn backend<E: std::error::Error + 'static>(operation: &str, err: E) -> QueueError {
    QueueError::Backend(format!("SQS {} failed: {}", operation, DisplayErrorContext(err)))
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    #[tracing::instrument(skip(self, body))]
    async fn publish(&self, queue: &str, body: &str) -> QueueResult<()> {
        self.client
            .send_message()
            .queue_url(self.queue_url(queue))
            .message_body(body)
            .send()
            .await
            .map_err(|e| backend("send_message", e))?;
        Ok(())
    }

    async fn receive(&self, queue: &str, wait: Duration) -> QueueResult<Option<Delivery>> {
        let wait_secs = wait.as_secs().min(MAX_WAIT_SECS) as i32;
        let resp = self
            .client
            .receive_message()
            .queue_url(self.queue_url(queue))
            .max_number_of_messages(1)
            .wait_time_seconds(wait_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| backend("receive_message", e))?;

        let Some(message) = resp.messages.and_then(|m| m.into_iter().next()) else {
            return Ok(None);
        };

        let Some(receipt) = message.receipt_handle().map(str::to_string) else {
            tracing::warn!(queue = %queue, "SQS message without receipt handle, skipping");
            return Ok(None);
        };

        let delivery_count = message
            .attributes()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|count| count.parse().ok())
            .unwrap_or(1);

        Ok(Some(Delivery {
            queue: queue.to_string(),
            body: message.body().unwrap_or_default().to_string(),
            delivery_count,
            receipt,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.delete(delivery).await
    }

    async fn nack(&self, delivery: &Delivery, delay: Duration, reason: &str) -> QueueResult<()> {
        tracing::debug!(queue = %delivery.queue, reason = %reason, "Returning SQS message");
        self.client
            .change_message_visibility()
            .queue_url(self.queue_url(&delivery.queue))
            .receipt_handle(&delivery.receipt)
            .visibility_timeout(delay.as_secs().min(MAX_VISIBILITY_SECS) as i32)
            .send()
            .await
            .map_err(|e| backend("change_message_visibility", e))?;
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        tracing::warn!(queue = %delivery.queue, reason = %reason, "Moving SQS message to dead-letter queue");
        self.client
            .send_message()
            .queue_url(self.dead_letter_url(&delivery.queue))
            .message_body(&delivery.body)
            .send()
            .await
            .map_err(|e| backend("send_message", e))?;
        self.delete(delivery).await
    }
}
