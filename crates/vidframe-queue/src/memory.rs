//! In-process queue with the same settle semantics as the durable backends.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::broker::{Delivery, MessageQueue, QueueError, QueueResult};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    body: String,
    delivery_count: i32,
    available_at: Instant,
}

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub queue: String,
    pub body: String,
    pub reason: String,
}

#[derive(Default)]
struct State {
    ready: HashMap<String, VecDeque<StoredMessage>>,
    in_flight: HashMap<u64, (String, StoredMessage)>,
    dead: Vec<DeadLetter>,
}

#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<State>,
    next_id: AtomicU64,
    wake: Notify,
    fail_publish: AtomicBool,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `publish` fail until reset
    pub fn set_publish_failing(&self, failing: bool) {
        self.fail_publish.store(failing, Ordering::SeqCst);
    }

    /// Bodies waiting on `queue`, including delayed redeliveries
    pub async fn pending(&self, queue: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .ready
            .get(queue)
            .map(|messages| messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Deliveries received but not yet settled
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead.clone()
    }

    async fn take_ready(&self, queue: &str) -> Option<Delivery> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let messages = state.ready.get_mut(queue)?;
        let position = messages.iter().position(|m| m.available_at <= now)?;
        let mut message = messages.remove(position)?;
        message.delivery_count += 1;

        let delivery = Delivery {
            queue: queue.to_string(),
            body: message.body.clone(),
            delivery_count: message.delivery_count,
            receipt: message.id.to_string(),
        };
        state
            .in_flight
            .insert(message.id, (queue.to_string(), message));
        Some(delivery)
    }

    async fn settle(&self, delivery: &Delivery) -> QueueResult<(String, StoredMessage)> {
        let id: u64 = delivery
            .receipt
            .parse()
            .map_err(|_| QueueError::UnknownDelivery(delivery.receipt.clone()))?;
        self.state
            .lock()
            .await
            .in_flight
            .remove(&id)
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.receipt.clone()))
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn publish(&self, queue: &str, body: &str) -> QueueResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(QueueError::Backend("broker unavailable".to_string()));
        }
        let message = StoredMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            body: body.to_string(),
            delivery_count: 0,
            available_at: Instant::now(),
        };
        self.state
            .lock()
            .await
            .ready
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
        self.wake.notify_waiters();
        Ok(())
    }

    async fn receive(&self, queue: &str, wait: Duration) -> QueueResult<Option<Delivery>> {
        if let Some(delivery) = self.take_ready(queue).await {
            return Ok(Some(delivery));
        }
        tokio::select! {
            _ = self.wake.notified() => {}
            _ = tokio::time::sleep(wait) => {}
        }
        Ok(self.take_ready(queue).await)
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.settle(delivery).await.map(|_| ())
    }

    async fn nack(&self, delivery: &Delivery, delay: Duration, _reason: &str) -> QueueResult<()> {
        let (queue, mut message) = self.settle(delivery).await?;
        message.available_at = Instant::now() + delay;
        self.state
            .lock()
            .await
            .ready
            .entry(queue)
            .or_default()
            .push_back(message);
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        let (queue, message) = self.settle(delivery).await?;
        self.state.lock().await.dead.push(DeadLetter {
            queue,
            body: message.body,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
