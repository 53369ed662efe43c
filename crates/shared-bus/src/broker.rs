//! # In-Process Topic Broker
//!
//! Topic-exchange semantics over per-queue `tokio::sync::mpsc` channels:
//! named durable queues bind routing patterns, publishers deliver to every
//! matching queue, consumers ack or reject each delivery. Rejected messages
//! land on a dead-letter store instead of being requeued, so a poison
//! message can never wedge its queue.
//!
//! Suitable for single-node operation; a distributed deployment would put
//! an AMQP-style broker behind the same [`EventPublisher`] seam.

use crate::error::BusError;
use crate::events::EventPayload;
use crate::message::Message;
use crate::publisher::EventPublisher;
use crate::routing::BindingPattern;
use crate::subscriber::Subscription;
use crate::DEFAULT_QUEUE_CAPACITY;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// A rejected delivery, kept for inspection instead of being requeued.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Queue whose consumer rejected the message.
    pub queue: String,
    pub message: Message,
    /// Handler-supplied rejection reason.
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

/// Delivery counters, updated relaxed; read for logs, stats and tests.
#[derive(Debug, Default)]
pub struct BusStats {
    published: AtomicU64,
    delivered: AtomicU64,
    acked: AtomicU64,
    rejected: AtomicU64,
    dead_lettered: AtomicU64,
}

impl BusStats {
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dead_lettered(&self) -> u64 {
        self.dead_lettered.load(Ordering::Relaxed)
    }
}

struct QueueSlot {
    sender: mpsc::Sender<Message>,
    patterns: Vec<BindingPattern>,
}

/// In-memory topic broker.
pub struct InMemoryBroker {
    queues: RwLock<HashMap<String, QueueSlot>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    stats: BusStats,
    capacity: usize,
}

impl InMemoryBroker {
    /// Create a broker with the default per-queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a broker with the given per-queue buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            dead_letters: Mutex::new(Vec::new()),
            stats: BusStats::default(),
            capacity,
        }
    }

    /// Bind a named durable queue to the given routing patterns.
    ///
    /// Queue names are unique per broker; a second consumer for the same
    /// name is a wiring error and returns [`BusError::QueueExists`].
    pub fn subscribe(
        self: &Arc<Self>,
        queue: impl Into<String>,
        patterns: Vec<BindingPattern>,
    ) -> Result<Subscription, BusError> {
        let queue = queue.into();
        let (sender, receiver) = mpsc::channel(self.capacity);
        {
            let mut queues = self.queues.write();
            if queues.contains_key(&queue) {
                return Err(BusError::QueueExists { queue });
            }
            queues.insert(queue.clone(), QueueSlot { sender, patterns });
        }
        debug!(queue = %queue, "queue bound");
        Ok(Subscription::new(queue, receiver, Arc::clone(self)))
    }

    /// Deliver a pre-built envelope to every matching queue.
    ///
    /// This is the at-least-once edge: redelivering the same envelope (same
    /// id, `redelivered` set) is legal and consumers must tolerate it.
    pub async fn publish_message(&self, message: Message) -> usize {
        self.stats.published.fetch_add(1, Ordering::Relaxed);

        // Collect matching senders first; the lock must not be held across
        // the sends below.
        let targets: Vec<(String, mpsc::Sender<Message>)> = {
            let queues = self.queues.read();
            queues
                .iter()
                .filter(|(_, slot)| {
                    slot.patterns
                        .iter()
                        .any(|pattern| pattern.matches(&message.routing_key))
                })
                .map(|(name, slot)| (name.clone(), slot.sender.clone()))
                .collect()
        };

        if targets.is_empty() {
            debug!(routing_key = %message.routing_key, "no queue bound for message");
            return 0;
        }

        let mut delivered = 0;
        let mut stale = Vec::new();
        for (queue, sender) in targets {
            if sender.send(message.clone()).await.is_ok() {
                delivered += 1;
            } else {
                // Consumer dropped its subscription between match and send.
                stale.push(queue);
            }
        }
        if !stale.is_empty() {
            let mut queues = self.queues.write();
            for queue in stale {
                queues.remove(&queue);
                debug!(queue = %queue, "pruned stale queue");
            }
        }

        self.stats
            .delivered
            .fetch_add(delivered, Ordering::Relaxed);
        debug!(
            routing_key = %message.routing_key,
            queues = delivered,
            "message delivered"
        );
        delivered as usize
    }

    /// Acknowledge a delivery as successfully processed.
    pub(crate) fn ack(&self, queue: &str, message: &Message) {
        self.stats.acked.fetch_add(1, Ordering::Relaxed);
        debug!(queue = %queue, message_id = %message.id, "delivery acked");
    }

    /// Reject a delivery without requeue; it is recorded as a dead letter.
    pub(crate) fn reject(&self, queue: &str, message: Message, reason: String) {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
        error!(
            queue = %queue,
            message_id = %message.id,
            routing_key = %message.routing_key,
            reason = %reason,
            "delivery rejected, dead-lettering"
        );
        self.dead_letters.lock().push(DeadLetter {
            queue: queue.to_string(),
            message,
            reason,
            rejected_at: Utc::now(),
        });
    }

    pub(crate) fn remove_queue(&self, queue: &str) {
        if self.queues.write().remove(queue).is_some() {
            debug!(queue = %queue, "queue unbound");
        }
    }

    /// Drain the dead-letter store.
    #[must_use]
    pub fn drain_dead_letters(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.dead_letters.lock())
    }

    #[must_use]
    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters.lock().len()
    }

    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.queues.read().len()
    }

    #[must_use]
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(&self, payload: EventPayload) -> usize {
        self.publish_message(Message::new(payload)).await
    }

    fn events_published(&self) -> u64 {
        self.stats.published()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AdoptionId, BusinessId, Money, PetId, UserId};
    use std::time::Duration;

    fn approved() -> EventPayload {
        EventPayload::AdoptionApproved {
            adoption_id: AdoptionId::new(),
            user_id: UserId::new(),
            pet_id: PetId::new(),
            business_id: BusinessId::new(),
            adoption_fee: Money::from_minor(500),
        }
    }

    fn rejected() -> EventPayload {
        EventPayload::AdoptionRejected {
            adoption_id: AdoptionId::new(),
            pet_id: PetId::new(),
            reason: "cat-only household".to_string(),
        }
    }

    async fn recv_timeout(sub: &mut Subscription) -> Message {
        tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("recv timed out")
            .expect("queue closed")
    }

    #[tokio::test]
    async fn publish_with_no_queue_reaches_nobody() {
        let broker = Arc::new(InMemoryBroker::new());
        let reached = broker.publish(approved()).await;
        assert_eq!(reached, 0);
        assert_eq!(broker.events_published(), 1);
    }

    #[tokio::test]
    async fn wildcard_queue_receives_all_saga_events() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut sub = broker
            .subscribe(
                "projection",
                vec![BindingPattern::parse("adoption.*").unwrap()],
            )
            .unwrap();

        assert_eq!(broker.publish(approved()).await, 1);
        assert_eq!(broker.publish(rejected()).await, 1);

        let first = recv_timeout(&mut sub).await;
        let second = recv_timeout(&mut sub).await;
        assert_eq!(first.routing_key.as_str(), "adoption.approved");
        assert_eq!(second.routing_key.as_str(), "adoption.rejected");
    }

    #[tokio::test]
    async fn non_matching_queue_is_skipped() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut payments = broker
            .subscribe(
                "payments",
                vec![BindingPattern::parse("payment.#").unwrap()],
            )
            .unwrap();

        assert_eq!(broker.publish(approved()).await, 0);
        assert!(payments.try_recv().is_none());
    }

    #[tokio::test]
    async fn duplicate_queue_name_is_refused() {
        let broker = Arc::new(InMemoryBroker::new());
        let _sub = broker
            .subscribe("saga", vec![BindingPattern::parse("adoption.*").unwrap()])
            .unwrap();
        let err = broker
            .subscribe("saga", vec![BindingPattern::parse("payment.#").unwrap()])
            .unwrap_err();
        assert!(matches!(err, BusError::QueueExists { .. }));
    }

    #[tokio::test]
    async fn dropping_a_subscription_unbinds_its_queue() {
        let broker = Arc::new(InMemoryBroker::new());
        let sub = broker
            .subscribe("saga", vec![BindingPattern::parse("adoption.*").unwrap()])
            .unwrap();
        assert_eq!(broker.queue_count(), 1);
        drop(sub);
        assert_eq!(broker.queue_count(), 0);

        // Same name can be bound again after the old consumer is gone.
        let _sub = broker
            .subscribe("saga", vec![BindingPattern::parse("adoption.*").unwrap()])
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_delivery_is_dead_lettered_not_requeued() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut sub = broker
            .subscribe("saga", vec![BindingPattern::parse("adoption.*").unwrap()])
            .unwrap();

        broker.publish(rejected()).await;
        let msg = recv_timeout(&mut sub).await;
        sub.reject(msg, "handler blew up");

        assert!(sub.try_recv().is_none(), "reject must not requeue");
        let letters = broker.drain_dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].queue, "saga");
        assert_eq!(letters[0].reason, "handler blew up");
        assert_eq!(broker.stats().rejected(), 1);
        assert_eq!(broker.dead_letter_count(), 0, "drained");
    }

    #[tokio::test]
    async fn redelivered_envelope_keeps_its_id() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut sub = broker
            .subscribe("saga", vec![BindingPattern::parse("adoption.*").unwrap()])
            .unwrap();

        let mut envelope = Message::new(approved());
        broker.publish_message(envelope.clone()).await;
        envelope.redelivered = true;
        broker.publish_message(envelope.clone()).await;

        let first = recv_timeout(&mut sub).await;
        let second = recv_timeout(&mut sub).await;
        assert_eq!(first.id, second.id);
        assert!(!first.redelivered);
        assert!(second.redelivered);
    }
}
