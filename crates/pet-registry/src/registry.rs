//! # Catalog Registries
//!
//! Write and read operations on the pet and business collections. This is
//! the seeding and wiring surface; availability changes flow exclusively
//! through the event-driven projection in [`crate::availability`].

use crate::error::RegistryError;
use chrono::Utc;
use shared_store::{DocumentStore, StoreError, TypedCollection};
use shared_types::{
    Business, BusinessId, BusinessStatus, DomainError, Money, Pet, PetAvailability, PetId,
};
use std::sync::Arc;

pub const COLLECTION_PETS: &str = "pets";
pub const COLLECTION_BUSINESSES: &str = "businesses";

const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Catalog operations on pets.
#[derive(Clone)]
pub struct PetRegistry {
    pets: TypedCollection<Pet>,
}

impl PetRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            pets: TypedCollection::new(store, COLLECTION_PETS),
        }
    }

    /// List a new pet as `Available`.
    pub fn register(
        &self,
        name: impl Into<String>,
        business_id: BusinessId,
        adoption_fee: Money,
    ) -> Result<Pet, RegistryError> {
        let now = Utc::now();
        let pet = Pet {
            id: PetId::new(),
            name: name.into(),
            business_id,
            adoption_fee,
            availability: PetAvailability::Available,
            created_at: now,
            updated_at: now,
        };
        self.pets.insert(pet.id.to_string(), &pet)?;
        Ok(pet)
    }

    pub fn get(&self, pet_id: PetId) -> Result<Option<Pet>, RegistryError> {
        Ok(self.pets.get(&pet_id.to_string())?.map(|v| v.doc))
    }
}

/// Catalog operations on businesses.
#[derive(Clone)]
pub struct BusinessRegistry {
    businesses: TypedCollection<Business>,
}

impl BusinessRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            businesses: TypedCollection::new(store, COLLECTION_BUSINESSES),
        }
    }

    /// Register a new business as `Active`.
    pub fn register(&self, name: impl Into<String>) -> Result<Business, RegistryError> {
        let business = Business {
            id: BusinessId::new(),
            name: name.into(),
            status: BusinessStatus::Active,
            created_at: Utc::now(),
        };
        self.businesses
            .insert(business.id.to_string(), &business)?;
        Ok(business)
    }

    pub fn get(&self, business_id: BusinessId) -> Result<Option<Business>, RegistryError> {
        Ok(self.businesses.get(&business_id.to_string())?.map(|v| v.doc))
    }

    /// Flip a business's status, e.g. suspend a shelter.
    pub fn set_status(
        &self,
        business_id: BusinessId,
        status: BusinessStatus,
    ) -> Result<(), RegistryError> {
        let key = business_id.to_string();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let loaded = self
                .businesses
                .get(&key)?
                .ok_or_else(|| DomainError::NotFound {
                    entity: "business",
                    id: key.clone(),
                })?;
            if loaded.doc.status == status {
                return Ok(());
            }
            let mut business = loaded.doc;
            business.status = status;
            match self.businesses.update(&key, loaded.version, &business) {
                Ok(()) => return Ok(()),
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
