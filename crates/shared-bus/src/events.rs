//! # Event Contracts
//!
//! The shared vocabulary of every message that crosses a service boundary:
//! one tagged payload variant per routing key, validated by serde at the
//! consumer edge instead of duck-typed maps. Field names serialize in
//! camelCase to match the platform wire format.

use crate::routing::RoutingKey;
use serde::{Deserialize, Serialize};
use shared_types::{
    AdoptionId, ApplicationStatus, BusinessId, CorrelationId, Money, Payment, PetId, PetSummary,
    UserId,
};

/// Routing keys and binding patterns used across the platform.
pub mod keys {
    use super::{CorrelationId, RoutingKey};

    pub const PET_VALIDATION_REQUEST: &str = "pet.validation.request";
    pub const BUSINESS_VALIDATION_REQUEST: &str = "business.validation.request";
    pub const ADOPTION_APPROVED: &str = "adoption.approved";
    pub const ADOPTION_REJECTED: &str = "adoption.rejected";
    pub const ADOPTION_COMPLETED: &str = "adoption.completed";
    pub const PAYMENT_HOLD_REQUEST: &str = "payment.hold.request";
    pub const PAYMENT_HOLD_CONFIRMED: &str = "payment.hold.confirmed";
    pub const PAYMENT_HOLD_FAILED: &str = "payment.hold.failed";
    pub const PAYMENT_COMPLETED: &str = "payment.completed";

    /// Every saga lifecycle event, for availability projections.
    pub const ADOPTION_EVENTS_PATTERN: &str = "adoption.*";
    /// Per-process response queue binding for pet validation replies.
    pub const PET_VALIDATION_RESPONSE_PATTERN: &str = "pet.validation.response.*";
    /// Per-process response queue binding for business validation replies.
    pub const BUSINESS_VALIDATION_RESPONSE_PATTERN: &str = "business.validation.response.*";

    /// Response key addressed to one waiting caller.
    #[must_use]
    pub fn pet_validation_response(correlation_id: CorrelationId) -> RoutingKey {
        RoutingKey::new_unchecked(format!("pet.validation.response.{correlation_id}"))
    }

    /// Response key addressed to one waiting caller.
    #[must_use]
    pub fn business_validation_response(correlation_id: CorrelationId) -> RoutingKey {
        RoutingKey::new_unchecked(format!("business.validation.response.{correlation_id}"))
    }
}

/// Result of a pet validation request, tagged by availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PetValidationOutcome {
    /// The pet can be adopted; carries its summary and owning business.
    Available {
        pet: PetSummary,
        business_id: BusinessId,
    },
    /// The pet cannot be adopted (unknown, booked, adopted, or its
    /// business is inactive).
    Unavailable { reason: String },
}

/// Result of a business validation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BusinessValidationOutcome {
    Active,
    Inactive { reason: String },
}

/// Every message payload that flows through the platform bus, one variant
/// per routing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventPayload {
    // =========================================================================
    // VALIDATION RPC (adoption saga -> pet registry -> business registry)
    // =========================================================================
    /// Is this pet available, and who owns it?
    /// Source: adoption saga | Target: pet registry
    PetValidationRequest {
        pet_id: PetId,
        correlation_id: CorrelationId,
    },

    /// Reply to [`Self::PetValidationRequest`], published on the
    /// correlation-suffixed response key.
    PetValidationResponse {
        correlation_id: CorrelationId,
        outcome: PetValidationOutcome,
    },

    /// Is this business active?
    /// Source: pet registry | Target: business registry
    BusinessValidationRequest {
        business_id: BusinessId,
        correlation_id: CorrelationId,
    },

    /// Reply to [`Self::BusinessValidationRequest`].
    BusinessValidationResponse {
        correlation_id: CorrelationId,
        outcome: BusinessValidationOutcome,
    },

    // =========================================================================
    // ADOPTION SAGA LIFECYCLE
    // =========================================================================
    /// A business approved an application; the fee is now due.
    /// Consumed by the payment processor (hold) and availability projection
    /// (pet -> booked).
    AdoptionApproved {
        adoption_id: AdoptionId,
        user_id: UserId,
        pet_id: PetId,
        business_id: BusinessId,
        adoption_fee: Money,
    },

    /// An application was rejected; the pet goes back on offer and any
    /// payment hold is released.
    AdoptionRejected {
        adoption_id: AdoptionId,
        pet_id: PetId,
        reason: String,
    },

    /// The saga reached its terminal happy state; the pet is adopted.
    AdoptionCompleted {
        adoption_id: AdoptionId,
        pet_id: PetId,
        user_id: UserId,
        status: ApplicationStatus,
    },

    // =========================================================================
    // PAYMENT / WALLET
    // =========================================================================
    /// Reserve the adoption fee on the applicant's wallet.
    PaymentHoldRequest {
        user_id: UserId,
        adoption_id: AdoptionId,
        amount: Money,
    },

    /// The fee is reserved; capture can proceed.
    PaymentHoldConfirmed {
        user_id: UserId,
        adoption_id: AdoptionId,
        amount: Money,
    },

    /// The fee could not be reserved; the saga rejects the application.
    PaymentHoldFailed {
        user_id: UserId,
        adoption_id: AdoptionId,
        amount: Money,
        reason: String,
    },

    /// Both transfer legs are durable; carries the full payment record.
    /// Consumed by the saga (mark paid) and notifications.
    PaymentCompleted { payment: Payment },
}

impl EventPayload {
    /// The routing key this payload is published under. Response payloads
    /// derive a correlation-suffixed key so only the waiting caller's queue
    /// matches.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey {
        match self {
            Self::PetValidationRequest { .. } => {
                RoutingKey::new_unchecked(keys::PET_VALIDATION_REQUEST.to_string())
            }
            Self::PetValidationResponse { correlation_id, .. } => {
                keys::pet_validation_response(*correlation_id)
            }
            Self::BusinessValidationRequest { .. } => {
                RoutingKey::new_unchecked(keys::BUSINESS_VALIDATION_REQUEST.to_string())
            }
            Self::BusinessValidationResponse { correlation_id, .. } => {
                keys::business_validation_response(*correlation_id)
            }
            Self::AdoptionApproved { .. } => {
                RoutingKey::new_unchecked(keys::ADOPTION_APPROVED.to_string())
            }
            Self::AdoptionRejected { .. } => {
                RoutingKey::new_unchecked(keys::ADOPTION_REJECTED.to_string())
            }
            Self::AdoptionCompleted { .. } => {
                RoutingKey::new_unchecked(keys::ADOPTION_COMPLETED.to_string())
            }
            Self::PaymentHoldRequest { .. } => {
                RoutingKey::new_unchecked(keys::PAYMENT_HOLD_REQUEST.to_string())
            }
            Self::PaymentHoldConfirmed { .. } => {
                RoutingKey::new_unchecked(keys::PAYMENT_HOLD_CONFIRMED.to_string())
            }
            Self::PaymentHoldFailed { .. } => {
                RoutingKey::new_unchecked(keys::PAYMENT_HOLD_FAILED.to_string())
            }
            Self::PaymentCompleted { .. } => {
                RoutingKey::new_unchecked(keys::PAYMENT_COMPLETED.to_string())
            }
        }
    }

    /// The correlation id, for request/reply payloads.
    #[must_use]
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            Self::PetValidationRequest { correlation_id, .. }
            | Self::PetValidationResponse { correlation_id, .. }
            | Self::BusinessValidationRequest { correlation_id, .. }
            | Self::BusinessValidationResponse { correlation_id, .. } => Some(*correlation_id),
            _ => None,
        }
    }

    /// The service that publishes this payload.
    #[must_use]
    pub fn source_service(&self) -> &'static str {
        match self {
            Self::PetValidationRequest { .. }
            | Self::AdoptionApproved { .. }
            | Self::AdoptionRejected { .. }
            | Self::AdoptionCompleted { .. } => "adoption-saga",
            Self::PetValidationResponse { .. } | Self::BusinessValidationRequest { .. } => {
                "pet-registry"
            }
            Self::BusinessValidationResponse { .. } => "business-registry",
            Self::PaymentHoldRequest { .. } => "adoption-saga",
            Self::PaymentHoldConfirmed { .. }
            | Self::PaymentHoldFailed { .. }
            | Self::PaymentCompleted { .. } => "wallet-ledger",
        }
    }
}
