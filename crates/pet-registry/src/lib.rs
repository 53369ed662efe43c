//! # Pet Registry Service
//!
//! The catalog side of the platform: pets and the businesses that list
//! them, the validation responders the adoption saga reaches over the bus,
//! and the projection that folds saga lifecycle events back into each
//! pet's availability.
//!
//! ## Responsibilities
//!
//! - **Catalog writes** ([`registry`]): register pets and businesses,
//!   suspend a business. Seeding and wiring surface; no HTTP here.
//! - **Validation RPC server** ([`responder`]): answer
//!   `pet.validation.request` and `business.validation.request` on their
//!   correlation-suffixed response keys. Pet validation chains a business
//!   validation call, so a suspended shelter's pets are never adoptable.
//! - **Availability projection** ([`availability`]): `adoption.approved`
//!   books a pet, `adoption.rejected` releases it, `adoption.completed`
//!   adopts it; duplicates and out-of-order deliveries land as no-ops.

pub mod availability;
pub mod error;
pub mod registry;
pub mod responder;

pub use availability::AvailabilityProjection;
pub use error::RegistryError;
pub use registry::{BusinessRegistry, PetRegistry, COLLECTION_BUSINESSES, COLLECTION_PETS};
pub use responder::{BusinessValidationResponder, PetValidationResponder};
