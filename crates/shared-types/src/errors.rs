//! # Error Taxonomy
//!
//! The stable domain error kinds every service reports. Infrastructure
//! failures (bus, store) have their own types in their own crates; nothing
//! here ever carries a stack trace across a service boundary.

use crate::entities::ApplicationStatus;
use crate::ids::{PetId, UserId};
use crate::money::Money;
use thiserror::Error;

/// Domain failures with stable kinds and human-readable reasons.
///
/// Everything here is recoverable by the caller (retry or surface to the
/// user); none of these may crash a consumer loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// No RPC response arrived within the deadline. The caller decides
    /// whether to retry; the pending request has already been discarded.
    #[error("validation timed out waiting for {operation}")]
    ValidationTimeout { operation: String },

    /// Entity absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Caller does not own the resource it is acting on.
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Action requested from the wrong saga state, including the repeated
    /// call case.
    #[error("already {current}")]
    InvalidStateTransition { current: ApplicationStatus },

    /// The operation would drive available funds negative.
    #[error("insufficient funds: available {available} < requested {requested}")]
    InsufficientFunds {
        available: Money,
        requested: Money,
    },

    /// A non-terminal application already exists for this (user, pet) pair.
    #[error("duplicate application: user {user_id} already has an active application for pet {pet_id}")]
    DuplicateApplication { user_id: UserId, pet_id: PetId },

    /// Pet validation came back negative.
    #[error("pet unavailable: {reason}")]
    PetUnavailable { reason: String },

    /// A required field was missing or empty (e.g. a rejection without a
    /// reason).
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl DomainError {
    /// Stable machine-readable kind, for logs and external reporting.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationTimeout { .. } => "validation_timeout",
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::DuplicateApplication { .. } => "duplicate_application",
            Self::PetUnavailable { .. } => "pet_unavailable",
            Self::InvalidInput { .. } => "invalid_input",
        }
    }
}
