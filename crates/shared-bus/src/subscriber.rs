//! # Queue Consumption
//!
//! A [`Subscription`] is the receiving end of one bound queue. It can be
//! consumed pull-style with [`Subscription::recv`], wrapped into a
//! [`Stream`] via [`Subscription::into_stream`], or driven by a spawned
//! consumer loop ([`spawn_consumer`]) that acks on `Ok` and dead-letters
//! on `Err`.

use crate::broker::InMemoryBroker;
use crate::error::HandlerError;
use crate::message::Message;
use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::debug;

/// Receiving handle for one named queue. Dropping it unbinds the queue.
pub struct Subscription {
    queue: String,
    receiver: mpsc::Receiver<Message>,
    broker: Arc<InMemoryBroker>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(
        queue: String,
        receiver: mpsc::Receiver<Message>,
        broker: Arc<InMemoryBroker>,
    ) -> Self {
        Self {
            queue,
            receiver,
            broker,
        }
    }

    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Wait for the next delivery. `None` means the queue is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Non-blocking receive for tests and drains.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }

    /// Acknowledge a delivery as processed.
    pub fn ack(&self, message: &Message) {
        self.broker.ack(&self.queue, message);
    }

    /// Reject a delivery without requeue; the broker dead-letters it.
    pub fn reject(&self, message: Message, reason: impl Into<String>) {
        self.broker.reject(&self.queue, message, reason.into());
    }

    /// Consume this subscription as a [`Stream`] of deliveries.
    #[must_use]
    pub fn into_stream(self) -> EventStream {
        EventStream { inner: self }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.remove_queue(&self.queue);
    }
}

/// [`Stream`] adapter over a [`Subscription`].
///
/// Deliveries consumed through the stream are not acked or rejected; use
/// this for observation-style consumers (projections, test taps), not for
/// queues where dead-lettering matters.
pub struct EventStream {
    inner: Subscription,
}

impl Stream for EventStream {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.receiver.poll_recv(cx)
    }
}

/// One queue's message handler.
///
/// Returning `Err` rejects the delivery (no requeue, dead-lettered); the
/// consumer loop continues with the next message either way.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

/// Drive a subscription with a handler until shutdown or queue close.
///
/// Ack on `Ok`, reject on `Err`. A failing message never stops the loop.
pub fn spawn_consumer(
    mut subscription: Subscription,
    handler: Arc<dyn EventHandler>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(queue = %subscription.queue(), "consumer stopped");
                        break;
                    }
                }
                maybe = subscription.recv() => {
                    let Some(message) = maybe else {
                        debug!(queue = %subscription.queue(), "queue closed");
                        break;
                    };
                    match handler.handle(&message).await {
                        Ok(()) => subscription.ack(&message),
                        Err(err) => subscription.reject(message, err.reason()),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;
    use crate::publisher::EventPublisher;
    use crate::routing::BindingPattern;
    use shared_types::{AdoptionId, PetId, UserId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn completed() -> EventPayload {
        EventPayload::AdoptionCompleted {
            adoption_id: AdoptionId::new(),
            pet_id: PetId::new(),
            user_id: UserId::new(),
            status: shared_types::ApplicationStatus::Completed,
        }
    }

    /// Fails the first delivery, accepts the rest.
    struct CountingHandler {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _message: &Message) -> Result<(), HandlerError> {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                return Err(HandlerError::new("transient failure"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn consumer_acks_on_ok_and_keeps_going_after_err() {
        let broker = Arc::new(InMemoryBroker::new());
        let sub = broker
            .subscribe("saga", vec![BindingPattern::parse("adoption.*").unwrap()])
            .unwrap();
        let handler = Arc::new(CountingHandler {
            seen: AtomicUsize::new(0),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = spawn_consumer(sub, handler.clone(), shutdown_rx);

        broker.publish(completed()).await;
        broker.publish(completed()).await;
        broker.publish(completed()).await;

        tokio::time::timeout(Duration::from_secs(1), async {
            while broker.stats().acked() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("consumer never processed the backlog");

        assert_eq!(handler.seen.load(Ordering::SeqCst), 3);
        assert_eq!(broker.stats().rejected(), 1);
        assert_eq!(broker.dead_letter_count(), 1);

        shutdown_tx.send(true).ok();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("consumer did not stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn stream_adapter_yields_deliveries_in_order() {
        let broker = Arc::new(InMemoryBroker::new());
        let sub = broker
            .subscribe("tap", vec![BindingPattern::parse("adoption.*").unwrap()])
            .unwrap();
        let mut stream = sub.into_stream();

        broker.publish(completed()).await;
        broker.publish(completed()).await;

        let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.routing_key.as_str(), "adoption.completed");
        assert_ne!(first.id, second.id);
    }
}
