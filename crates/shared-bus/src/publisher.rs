//! # Event Publisher
//!
//! The publishing side of the bus: the seam every service emits through.

use crate::events::EventPayload;
use async_trait::async_trait;

/// Trait for publishing events to the bus.
///
/// Connection failure is not a per-publish concern: establishing the broker
/// link (with bounded retry) happens in [`crate::connector`], and a service
/// that cannot connect never gets a publisher to call.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a payload under its contract routing key.
    ///
    /// Delivery is at-least-once to every queue whose binding matches.
    /// Returns the number of queues reached; zero is not an error (nobody
    /// is listening yet).
    async fn publish(&self, payload: EventPayload) -> usize;

    /// Total number of events published through this handle.
    fn events_published(&self) -> u64;
}
