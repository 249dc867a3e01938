//! Message queues for vidframe
//!
//! [`MessageQueue`] is the broker capability: durable, at-least-once,
//! point-to-point, with explicit acknowledgement. [`QueueConsumer`] is the
//! single-flight consume loop every consuming process runs.
//!
//! Backends: PostgreSQL table queue (default), AWS SQS (`sqs` feature) and an
//! in-memory queue for tests.

pub mod broker;
pub mod consumer;
pub mod memory;
pub mod postgres;
#[cfg(feature = "sqs")]
pub mod sqs;

pub use broker::{Delivery, MessageHandler, MessageQueue, MessageQueueExt, QueueError, QueueResult};
pub use consumer::{
    compute_retry_backoff_seconds, ConsumerConfig, QueueConsumer, Settlement, MAX_RETRY_BACKOFF_SECS,
};
pub use memory::{DeadLetter, InMemoryQueue};
pub use postgres::PgMessageQueue;
#[cfg(feature = "sqs")]
pub use sqs::SqsMessageQueue;
