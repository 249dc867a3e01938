//! Message broker setup and the consume loop runner

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use vidframe_core::{Config, QueueBackend};
use vidframe_queue::{ConsumerConfig, MessageHandler, MessageQueue, PgMessageQueue, QueueConsumer};

/// Build the configured broker. `consume` starts the Postgres LISTEN task so
/// idle consumers wake as soon as a message is published.
pub async fn setup_queue(
    config: &Config,
    pool: &PgPool,
    consume: bool,
) -> Result<Arc<dyn MessageQueue>> {
    match config.queue_backend() {
        QueueBackend::Postgres => {
            let visibility =
                Duration::from_secs(config.queue_visibility_timeout_secs().max(1) as u64);
            let queue = PgMessageQueue::new(pool.clone(), visibility);
            if consume {
                let _listener = queue.start_listener();
            }
            tracing::info!(
                visibility_timeout_secs = visibility.as_secs(),
                "Postgres queue initialized"
            );
            Ok(Arc::new(queue))
        }
        QueueBackend::Sqs => {
            let prefix = config
                .sqs_queue_url_prefix()
                .context("SQS_QUEUE_URL_PREFIX not configured")?;
            let queue = vidframe_queue::SqsMessageQueue::from_env(prefix).await;
            tracing::info!(url_prefix = %prefix, "SQS queue initialized");
            Ok(Arc::new(queue))
        }
    }
}

pub fn consumer_config(config: &Config, queue: &str) -> ConsumerConfig {
    ConsumerConfig::new(queue)
        .with_max_deliveries(config.queue_max_deliveries())
        .with_wait(Duration::from_millis(config.queue_poll_interval_ms().max(1)))
}

/// Consume `queue_name` with `handler` until SIGINT/SIGTERM, then drain the
/// in-flight message and return.
pub async fn run_consumer(
    config: &Config,
    queue: Arc<dyn MessageQueue>,
    queue_name: &str,
    handler: Arc<dyn MessageHandler>,
    span: tracing::Span,
) {
    let consumer = QueueConsumer::new(queue, handler, consumer_config(config, queue_name), span);
    let shutdown = vidframe_infra::shutdown_token();
    consumer.run(shutdown).await;
}
