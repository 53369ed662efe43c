//! # Availability Projection
//!
//! Folds adoption lifecycle events into each pet's availability field.
//! Cross-entity consistency here is maintained purely through event
//! consumption: the broker is at-least-once and unordered across routing
//! keys, so every write is a last-write-wins field set that absorbs
//! duplicates and out-of-order arrivals as no-ops.

use crate::error::RegistryError;
use crate::registry::COLLECTION_PETS;
use async_trait::async_trait;
use chrono::Utc;
use shared_bus::{EventHandler, EventPayload, HandlerError, Message};
use shared_store::{DocumentStore, StoreError, TypedCollection};
use shared_types::{Pet, PetAvailability, PetId};
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Which write an inbound event may apply given the pet's current state.
///
/// `Adopted` is terminal and always wins; a booking only takes an available
/// pet; a release only takes a booked one. Everything else is a duplicate
/// or out-of-order delivery and lands as a no-op.
fn reconcile(current: PetAvailability, target: PetAvailability) -> Option<PetAvailability> {
    match (current, target) {
        (current, target) if current == target => None,
        (_, PetAvailability::Adopted) => Some(PetAvailability::Adopted),
        (PetAvailability::Available, PetAvailability::Booked) => Some(PetAvailability::Booked),
        (PetAvailability::Booked, PetAvailability::Available) => Some(PetAvailability::Available),
        _ => None,
    }
}

/// Event-driven projection of saga events onto pet availability.
pub struct AvailabilityProjection {
    pets: TypedCollection<Pet>,
}

impl AvailabilityProjection {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            pets: TypedCollection::new(store, COLLECTION_PETS),
        }
    }

    fn apply(&self, pet_id: PetId, target: PetAvailability) -> Result<(), RegistryError> {
        let key = pet_id.to_string();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(loaded) = self.pets.get(&key)? else {
                warn!(pet_id = %pet_id, target = %target, "availability event for unknown pet ignored");
                return Ok(());
            };
            let Some(next) = reconcile(loaded.doc.availability, target) else {
                debug!(
                    pet_id = %pet_id,
                    current = %loaded.doc.availability,
                    target = %target,
                    "availability unchanged"
                );
                return Ok(());
            };
            let mut pet = loaded.doc;
            pet.availability = next;
            pet.updated_at = Utc::now();
            match self.pets.update(&key, loaded.version, &pet) {
                Ok(()) => {
                    debug!(pet_id = %pet_id, availability = %next, "pet availability updated");
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl EventHandler for AvailabilityProjection {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let (pet_id, target) = match &message.payload {
            EventPayload::AdoptionApproved { pet_id, .. } => (*pet_id, PetAvailability::Booked),
            EventPayload::AdoptionRejected { pet_id, .. } => (*pet_id, PetAvailability::Available),
            EventPayload::AdoptionCompleted { pet_id, .. } => (*pet_id, PetAvailability::Adopted),
            _ => {
                return Err(HandlerError::new(format!(
                    "unexpected payload on {}",
                    message.routing_key
                )))
            }
        };
        self.apply(pet_id, target)?;
        Ok(())
    }
}
