//! Message envelope delivered to queue consumers.

use crate::events::EventPayload;
use crate::routing::RoutingKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One delivery: the payload plus the envelope fields consumers key off.
///
/// The broker may deliver the same message more than once; `id` is stable
/// across redeliveries so consumers can deduplicate when they need to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Broker-assigned delivery identity, stable across redelivery.
    pub id: Uuid,
    /// The key the publisher tagged this message with.
    pub routing_key: RoutingKey,
    pub payload: EventPayload,
    pub published_at: DateTime<Utc>,
    /// True when the broker knows this is not the first delivery attempt.
    pub redelivered: bool,
}

impl Message {
    /// Wrap a payload for publication under its contract routing key.
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            routing_key: payload.routing_key(),
            payload,
            published_at: Utc::now(),
            redelivered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AdoptionId, PetId};

    #[test]
    fn envelope_key_comes_from_the_payload() {
        let msg = Message::new(EventPayload::AdoptionRejected {
            adoption_id: AdoptionId::new(),
            pet_id: PetId::new(),
            reason: "household has a parrot".to_string(),
        });
        assert_eq!(msg.routing_key.as_str(), "adoption.rejected");
        assert!(!msg.redelivered);
    }
}
