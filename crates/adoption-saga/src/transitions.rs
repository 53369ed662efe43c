//! # Status Transitions
//!
//! The pure guards over [`ApplicationStatus`]. Every mutation of an
//! application goes through one of these; the current status doubles as the
//! concurrency guard, so a duplicate delivery or a repeated call either
//! reports "already {status}" or lands as a deliberate no-op.

use chrono::{DateTime, Utc};
use shared_types::{AdoptionApplication, ApplicationStatus, DomainError, PaymentId};

/// Whether a guarded transition changed the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The application was already in the target state; nothing changed and
    /// no event should be published.
    NoOp,
}

impl Transition {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }
}

/// `Pending -> PaymentPending`, on business approval.
pub fn begin_payment(
    application: &mut AdoptionApplication,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if application.status != ApplicationStatus::Pending {
        return Err(DomainError::InvalidStateTransition {
            current: application.status,
        });
    }
    application.status = ApplicationStatus::PaymentPending;
    application.updated_at = now;
    Ok(())
}

/// `Pending -> Rejected`, on business decision. The reason is mandatory.
pub fn reject(
    application: &mut AdoptionApplication,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if reason.trim().is_empty() {
        return Err(DomainError::InvalidInput {
            reason: "a rejection requires a reason".to_string(),
        });
    }
    if application.status != ApplicationStatus::Pending {
        return Err(DomainError::InvalidStateTransition {
            current: application.status,
        });
    }
    application.status = ApplicationStatus::Rejected;
    application.rejection_reason = Some(reason.to_string());
    application.updated_at = now;
    Ok(())
}

/// `PaymentPending -> Completed`, on payment settlement.
///
/// A redelivered settlement for the same payment is a no-op; any other
/// state is a transition error.
pub fn complete(
    application: &mut AdoptionApplication,
    payment_id: PaymentId,
    paid_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Transition, DomainError> {
    match application.status {
        ApplicationStatus::PaymentPending => {
            application.status = ApplicationStatus::Completed;
            application.payment.payment_id = Some(payment_id);
            application.payment.is_paid = true;
            application.payment.paid_at = paid_at.or(Some(now));
            application.updated_at = now;
            Ok(Transition::Applied)
        }
        ApplicationStatus::Completed if application.payment.payment_id == Some(payment_id) => {
            Ok(Transition::NoOp)
        }
        current => Err(DomainError::InvalidStateTransition { current }),
    }
}

/// `{Pending, PaymentPending} -> Rejected`, when payment cannot happen
/// (failed hold, elapsed payment window).
///
/// Terminal applications absorb this as a no-op: payment failure events
/// arrive at-least-once and can race the settlement that beat them.
pub fn fail_payment(
    application: &mut AdoptionApplication,
    reason: &str,
    now: DateTime<Utc>,
) -> Transition {
    if application.status.is_terminal() {
        return Transition::NoOp;
    }
    application.status = ApplicationStatus::Rejected;
    application.rejection_reason = Some(reason.to_string());
    application.updated_at = now;
    Transition::Applied
}
