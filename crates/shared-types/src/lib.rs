//! # Shared Types Crate
//!
//! Domain entities, identifiers, and the error taxonomy shared across all
//! Pawhaven services.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a service boundary
//!   is defined here, never re-declared per service.
//! - **Stable error kinds**: domain failures surface as [`DomainError`]
//!   variants with human-readable reasons; services add infrastructure
//!   context but never invent new domain kinds.
//! - **Minor-unit money**: all amounts are integer minor units; floating
//!   point never touches a balance.

pub mod entities;
pub mod errors;
pub mod ids;
pub mod money;

pub use entities::*;
pub use errors::DomainError;
pub use ids::*;
pub use money::Money;
