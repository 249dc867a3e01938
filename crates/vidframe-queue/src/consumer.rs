//! Single-flight consume loop.
//!
//! One delivery is handled at a time. Cancellation stops new receives; a
//! handler that has already started runs to completion and its delivery is
//! settled before [`QueueConsumer::run`] returns.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::broker::{Delivery, MessageHandler, MessageQueue};

/// Maximum delay in seconds before a failed delivery is retried. Caps exponential
/// backoff so that high delivery counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Backoff in seconds for a given delivery count (exponential with cap).
#[inline]
pub fn compute_retry_backoff_seconds(delivery_count: i32) -> u64 {
    let exponent = delivery_count.clamp(0, 31) as u32;
    2_u64.pow(exponent).min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub queue: String,
    /// Deliveries after which a recoverable failure is dead-lettered instead of retried
    pub max_deliveries: i32,
    /// Long-poll wait per receive
    pub wait: Duration,
}

impl ConsumerConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            max_deliveries: 5,
            wait: Duration::from_millis(1000),
        }
    }

    pub fn with_max_deliveries(mut self, max_deliveries: i32) -> Self {
        self.max_deliveries = max_deliveries;
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }
}

/// How a handled delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Acked,
    Retried { backoff_secs: u64 },
    DeadLettered,
}

pub struct QueueConsumer {
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn MessageHandler>,
    config: ConsumerConfig,
    span: tracing::Span,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        handler: Arc<dyn MessageHandler>,
        config: ConsumerConfig,
        span: tracing::Span,
    ) -> Self {
        Self {
            queue,
            handler,
            config,
            span,
        }
    }

    /// Consume until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        let span = self.span.clone();
        self.run_inner(shutdown).instrument(span).await
    }

    async fn run_inner(&self, shutdown: CancellationToken) {
        tracing::info!(
            queue = %self.config.queue,
            max_deliveries = self.config.max_deliveries,
            "Queue consumer started"
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = self.queue.receive(&self.config.queue, self.config.wait) => received,
            };

            match received {
                Ok(Some(delivery)) => {
                    self.process(&delivery).await;
                }
                Ok(None) => {
                    tracing::trace!(queue = %self.config.queue, "No messages available");
                }
                Err(e) => {
                    tracing::error!(error = %e, queue = %self.config.queue, "Failed to receive from queue");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.wait) => {}
                    }
                }
            }
        }

        tracing::info!(queue = %self.config.queue, "Queue consumer stopped");
    }

    /// Handle one delivery and settle it. Settlement failures are logged; the
    /// broker redelivers the message once its visibility lapses.
    pub async fn process(&self, delivery: &Delivery) -> Option<Settlement> {
        let result = self.handler.handle(delivery).await;

        let (settlement, outcome) = match result {
            Ok(()) => (Settlement::Acked, self.queue.ack(delivery).await),
            Err(e) if !e.is_recoverable() => {
                tracing::error!(
                    error = %e,
                    queue = %delivery.queue,
                    delivery_count = delivery.delivery_count,
                    "Message failed with unrecoverable error, dead-lettering"
                );
                (
                    Settlement::DeadLettered,
                    self.queue.dead_letter(delivery, &e.to_string()).await,
                )
            }
            Err(e) if delivery.delivery_count >= self.config.max_deliveries => {
                tracing::error!(
                    error = %e,
                    queue = %delivery.queue,
                    delivery_count = delivery.delivery_count,
                    "Message failed after max deliveries, dead-lettering"
                );
                (
                    Settlement::DeadLettered,
                    self.queue.dead_letter(delivery, &e.to_string()).await,
                )
            }
            Err(e) => {
                let backoff_secs = compute_retry_backoff_seconds(delivery.delivery_count);
                tracing::warn!(
                    error = %e,
                    queue = %delivery.queue,
                    delivery_count = delivery.delivery_count,
                    backoff_seconds = backoff_secs,
                    "Message failed, scheduling redelivery"
                );
                (
                    Settlement::Retried { backoff_secs },
                    self.queue
                        .nack(delivery, Duration::from_secs(backoff_secs), &e.to_string())
                        .await,
                )
            }
        };

        match outcome {
            Ok(()) => Some(settlement),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    queue = %delivery.queue,
                    receipt = %delivery.receipt,
                    "Failed to settle delivery"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryQueue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vidframe_core::TaskError;

    struct ScriptedHandler {
        calls: AtomicUsize,
        recoverable: Option<bool>,
    }

    impl ScriptedHandler {
        fn new(recoverable: Option<bool>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                recoverable,
            })
        }
    }

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        async fn handle(&self, _delivery: &Delivery) -> Result<(), TaskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.recoverable {
                None => Ok(()),
                Some(true) => Err(TaskError::recoverable(anyhow::anyhow!("network"))),
                Some(false) => Err(TaskError::unrecoverable(anyhow::anyhow!("bad input"))),
            }
        }
    }

    fn consumer(queue: Arc<InMemoryQueue>, handler: Arc<ScriptedHandler>) -> QueueConsumer {
        QueueConsumer::new(
            queue,
            handler,
            ConsumerConfig::new("jobs")
                .with_max_deliveries(3)
                .with_wait(Duration::from_millis(10)),
            tracing::Span::none(),
        )
    }

    async fn receive(queue: &InMemoryQueue) -> Delivery {
        queue
            .receive("jobs", Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(40), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(-1), 1);
    }

    #[tokio::test]
    async fn success_is_acked() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = ScriptedHandler::new(None);
        let consumer = consumer(queue.clone(), handler.clone());

        queue.publish("jobs", "{}").await.unwrap();
        let delivery = receive(&queue).await;

        assert_eq!(consumer.process(&delivery).await, Some(Settlement::Acked));
        assert!(queue.pending("jobs").await.is_empty());
        assert!(queue.dead_letters().await.is_empty());
    }

    #[tokio::test]
    async fn unrecoverable_error_is_dead_lettered_immediately() {
        let queue = Arc::new(InMemoryQueue::new());
        let consumer = consumer(queue.clone(), ScriptedHandler::new(Some(false)));

        queue.publish("jobs", "{}").await.unwrap();
        let delivery = receive(&queue).await;

        assert_eq!(
            consumer.process(&delivery).await,
            Some(Settlement::DeadLettered)
        );
        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert!(dead[0].reason.contains("bad input"));
    }

    #[tokio::test]
    async fn recoverable_error_is_nacked_with_backoff() {
        let queue = Arc::new(InMemoryQueue::new());
        let consumer = consumer(queue.clone(), ScriptedHandler::new(Some(true)));

        queue.publish("jobs", "{}").await.unwrap();
        let delivery = receive(&queue).await;

        assert_eq!(
            consumer.process(&delivery).await,
            Some(Settlement::Retried { backoff_secs: 2 })
        );
        assert_eq!(queue.pending("jobs").await.len(), 1);
        assert!(queue.dead_letters().await.is_empty());
    }

    #[tokio::test]
    async fn recoverable_error_at_max_deliveries_is_dead_lettered() {
        let queue = Arc::new(InMemoryQueue::new());
        let consumer = QueueConsumer::new(
            queue.clone(),
            ScriptedHandler::new(Some(true)),
            ConsumerConfig::new("jobs").with_max_deliveries(1),
            tracing::Span::none(),
        );

        queue.publish("jobs", "{}").await.unwrap();
        let delivery = receive(&queue).await;

        assert_eq!(
            consumer.process(&delivery).await,
            Some(Settlement::DeadLettered)
        );
        assert!(queue.pending("jobs").await.is_empty());
        assert_eq!(queue.dead_letters().await.len(), 1);
    }

    #[tokio::test]
    async fn settling_an_unknown_delivery_is_reported() {
        let queue = Arc::new(InMemoryQueue::new());
        let consumer = consumer(queue.clone(), ScriptedHandler::new(None));
        let stray = Delivery {
            queue: "jobs".to_string(),
            body: "{}".to_string(),
            delivery_count: 1,
            receipt: "999".to_string(),
        };

        assert_eq!(consumer.process(&stray).await, None);
    }

    #[tokio::test]
    async fn run_stops_on_cancellation_after_draining() {
        let queue = Arc::new(InMemoryQueue::new());
        let handler = ScriptedHandler::new(None);
        let consumer = Arc::new(consumer(queue.clone(), handler.clone()));

        queue.publish("jobs", "{}").await.unwrap();
        queue.publish("jobs", "{}").await.unwrap();

        let shutdown = CancellationToken::new();
        let task = {
            let consumer = consumer.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { consumer.run(shutdown).await })
        };

        for _ in 0..100 {
            if handler.calls.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert!(queue.pending("jobs").await.is_empty());
        assert_eq!(queue.in_flight().await, 0);
    }
}
