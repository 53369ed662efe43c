//! # Shared Bus - Message Bus Adapter for Cross-Service Choreography
//!
//! All inter-service communication on the platform flows through this crate:
//! services never call each other directly, they publish to routing keys and
//! consume from bound queues.
//!
//! ## Choreography Pattern
//!
//! ```text
//! ┌──────────────┐                       ┌──────────────┐
//! │ Adoption     │                       │ Wallet       │
//! │ Saga         │   publish(approved)   │ Ledger       │
//! │              │ ──────┐               │              │
//! └──────────────┘       │               └──────────────┘
//!                        ▼                       ↑
//!                  ┌──────────────┐             │
//!                  │  Topic Broker │ ────────────┘
//!                  │              │   queue bound to
//!                  └──────────────┘   `adoption.*`
//! ```
//!
//! ## Delivery Contract
//!
//! - **At-least-once:** a message may arrive more than once; every consumer
//!   on this platform is idempotent.
//! - **Ack / reject:** a delivery is acknowledged only when the handler
//!   returns `Ok`; on `Err` it is rejected without requeue and recorded on
//!   the dead-letter store, so a poison message can never wedge its queue.
//! - **Bounded reconnect:** establishing the broker connection retries with
//!   fixed backoff up to a bounded attempt count; exhaustion is fatal to the
//!   service's messaging capability, never silently swallowed.
//!
//! The [`rpc`] module layers an awaitable request/reply protocol on top of
//! the one-way bus using correlation ids and per-process response queues.

pub mod broker;
pub mod connector;
pub mod error;
pub mod events;
pub mod message;
pub mod publisher;
pub mod routing;
pub mod rpc;
pub mod subscriber;

// Re-export main types
pub use broker::{BusStats, DeadLetter, InMemoryBroker};
pub use connector::{connect, BrokerDialer, InMemoryDialer, ReconnectPolicy};
pub use error::{BusError, HandlerError};
pub use events::{
    keys, BusinessValidationOutcome, EventPayload, PetValidationOutcome,
};
pub use message::Message;
pub use publisher::EventPublisher;
pub use routing::{BindingPattern, RoutingKey};
pub use rpc::{PendingRequestStore, RpcClient, RpcStats};
pub use subscriber::{spawn_consumer, EventHandler, EventStream, Subscription};

/// Maximum messages buffered per queue before publishers feel backpressure.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_QUEUE_CAPACITY, 1000);
    }
}
