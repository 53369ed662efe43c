//! # Saga Coordinator
//!
//! The write side of the adoption lifecycle. Commands (apply, approve,
//! reject, pay-related updates) load the application, run a guard from
//! [`crate::transitions`], commit with version retry, and only then publish
//! the corresponding lifecycle event. Publishing after the durable commit
//! means a consumer can always load the state the event describes; the cost
//! is an at-least-once contract everywhere downstream.

use crate::clock::Clock;
use crate::error::SagaError;
use crate::transitions::{self, Transition};
use chrono::{DateTime, Utc};
use shared_bus::{BusError, EventPayload, EventPublisher, PetValidationOutcome, RpcClient};
use shared_store::{DocumentStore, StoreError, TypedCollection};
use shared_types::{
    AdoptionApplication, AdoptionId, ApplicationStatus, BusinessId, DomainError, PaymentId, PetId,
    PetSummary, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const COLLECTION_APPLICATIONS: &str = "applications";

const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Coordinates adoption applications.
#[derive(Clone)]
pub struct AdoptionSaga {
    applications: TypedCollection<AdoptionApplication>,
    rpc: Arc<RpcClient>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
}

impl AdoptionSaga {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        rpc: Arc<RpcClient>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            applications: TypedCollection::new(store, COLLECTION_APPLICATIONS),
            rpc,
            publisher,
            clock,
        }
    }

    pub fn get(&self, adoption_id: AdoptionId) -> Result<Option<AdoptionApplication>, SagaError> {
        Ok(self.applications.get(&adoption_id.to_string())?.map(|v| v.doc))
    }

    /// Submit an application for a pet.
    ///
    /// The pet is validated over RPC before anything is persisted, then the
    /// duplicate check runs: one non-terminal application per (user, pet)
    /// pair. A rejected or completed earlier application does not block a
    /// fresh one.
    pub async fn apply(
        &self,
        user_id: UserId,
        pet_id: PetId,
    ) -> Result<AdoptionApplication, SagaError> {
        let (_, business_id) = self.validate_pet(pet_id).await?;

        let duplicate = self.applications.list()?.into_iter().any(|(_, v)| {
            v.doc.user_id == user_id && v.doc.pet_id == pet_id && !v.doc.status.is_terminal()
        });
        if duplicate {
            return Err(DomainError::DuplicateApplication { user_id, pet_id }.into());
        }

        let application = AdoptionApplication::new(pet_id, user_id, business_id, self.clock.now());
        self.applications
            .insert(application.storage_key(), &application)?;
        info!(
            adoption_id = %application.id,
            pet_id = %pet_id,
            user_id = %user_id,
            business_id = %business_id,
            "application submitted"
        );
        Ok(application)
    }

    /// Approve an application on behalf of the pet's business.
    ///
    /// The pet is re-validated to price the fee at approval time; the
    /// approved event and the hold request go out only after the
    /// `PaymentPending` flip is durable.
    pub async fn approve(
        &self,
        business_id: BusinessId,
        adoption_id: AdoptionId,
    ) -> Result<AdoptionApplication, SagaError> {
        let current = self.require(adoption_id)?;
        if current.business_id != business_id {
            return Err(DomainError::Unauthorized {
                reason: "application belongs to a different business".to_string(),
            }
            .into());
        }

        let (pet, _) = self.validate_pet(current.pet_id).await?;
        let application =
            self.commit_transition(adoption_id, |app, now| transitions::begin_payment(app, now))?;

        info!(
            adoption_id = %adoption_id,
            business_id = %business_id,
            adoption_fee = %pet.adoption_fee,
            "application approved, awaiting payment"
        );
        self.publisher
            .publish(EventPayload::AdoptionApproved {
                adoption_id,
                user_id: application.user_id,
                pet_id: application.pet_id,
                business_id,
                adoption_fee: pet.adoption_fee,
            })
            .await;
        self.publisher
            .publish(EventPayload::PaymentHoldRequest {
                user_id: application.user_id,
                adoption_id,
                amount: pet.adoption_fee,
            })
            .await;
        Ok(application)
    }

    /// Reject an application on behalf of the pet's business.
    pub async fn reject(
        &self,
        business_id: BusinessId,
        adoption_id: AdoptionId,
        reason: &str,
    ) -> Result<AdoptionApplication, SagaError> {
        let current = self.require(adoption_id)?;
        if current.business_id != business_id {
            return Err(DomainError::Unauthorized {
                reason: "application belongs to a different business".to_string(),
            }
            .into());
        }

        let application =
            self.commit_transition(adoption_id, |app, now| transitions::reject(app, reason, now))?;
        info!(adoption_id = %adoption_id, reason, "application rejected");
        self.publisher
            .publish(EventPayload::AdoptionRejected {
                adoption_id,
                pet_id: application.pet_id,
                reason: reason.to_string(),
            })
            .await;
        Ok(application)
    }

    /// Advance a `PaymentPending` application to `Completed` after its
    /// payment settled. Redeliveries of the same settlement are no-ops.
    pub async fn mark_paid(
        &self,
        adoption_id: AdoptionId,
        payment_id: PaymentId,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<(), SagaError> {
        let mut transition = Transition::Applied;
        let application = self.commit_transition(adoption_id, |app, now| {
            transition = transitions::complete(app, payment_id, paid_at, now)?;
            Ok(())
        })?;
        if transition.is_noop() {
            debug!(adoption_id = %adoption_id, "settlement redelivered, already completed");
            return Ok(());
        }

        info!(adoption_id = %adoption_id, payment_id = %payment_id, "adoption completed");
        self.publisher
            .publish(EventPayload::AdoptionCompleted {
                adoption_id,
                pet_id: application.pet_id,
                user_id: application.user_id,
                status: ApplicationStatus::Completed,
            })
            .await;
        Ok(())
    }

    /// Reject an application whose payment cannot happen. Terminal
    /// applications absorb this silently.
    pub async fn fail_payment(
        &self,
        adoption_id: AdoptionId,
        reason: &str,
    ) -> Result<(), SagaError> {
        let mut transition = Transition::Applied;
        let application = self.commit_transition(adoption_id, |app, now| {
            transition = transitions::fail_payment(app, reason, now);
            Ok(())
        })?;
        if transition.is_noop() {
            debug!(adoption_id = %adoption_id, "payment failure after a terminal state, ignored");
            return Ok(());
        }

        warn!(adoption_id = %adoption_id, reason, "application rejected by payment failure");
        self.publisher
            .publish(EventPayload::AdoptionRejected {
                adoption_id,
                pet_id: application.pet_id,
                reason: reason.to_string(),
            })
            .await;
        Ok(())
    }

    /// Reject every application stuck in `PaymentPending` longer than the
    /// payment window. Returns how many were expired.
    pub async fn expire_stuck_payments(&self, window: Duration) -> Result<usize, SagaError> {
        let Ok(window) = chrono::Duration::from_std(window) else {
            return Ok(0);
        };
        let cutoff = self.clock.now() - window;

        let mut expired = 0;
        for (_, versioned) in self.applications.list()? {
            let app = versioned.doc;
            if app.status == ApplicationStatus::PaymentPending && app.updated_at <= cutoff {
                self.fail_payment(app.id, "payment window elapsed").await?;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn validate_pet(
        &self,
        pet_id: PetId,
    ) -> Result<(PetSummary, BusinessId), SagaError> {
        let response = match self
            .rpc
            .call("validate_pet", None, |correlation_id| {
                EventPayload::PetValidationRequest {
                    pet_id,
                    correlation_id,
                }
            })
            .await
        {
            Ok(payload) => payload,
            Err(BusError::Timeout { .. }) => {
                return Err(DomainError::ValidationTimeout {
                    operation: "pet validation".to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        match response {
            EventPayload::PetValidationResponse {
                outcome: PetValidationOutcome::Available { pet, business_id },
                ..
            } => Ok((pet, business_id)),
            EventPayload::PetValidationResponse {
                outcome: PetValidationOutcome::Unavailable { reason },
                ..
            } => Err(DomainError::PetUnavailable { reason }.into()),
            _ => Err(BusError::UnexpectedResponse {
                operation: "validate_pet",
            }
            .into()),
        }
    }

    fn require(&self, adoption_id: AdoptionId) -> Result<AdoptionApplication, SagaError> {
        self.get(adoption_id)?.ok_or_else(|| {
            DomainError::NotFound {
                entity: "application",
                id: adoption_id.to_string(),
            }
            .into()
        })
    }

    /// Load, guard, commit; retried on version conflict with the guard
    /// re-run against the fresh document.
    fn commit_transition(
        &self,
        adoption_id: AdoptionId,
        mut guard: impl FnMut(&mut AdoptionApplication, DateTime<Utc>) -> Result<(), DomainError>,
    ) -> Result<AdoptionApplication, SagaError> {
        let key = adoption_id.to_string();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let loaded = self
                .applications
                .get(&key)?
                .ok_or_else(|| DomainError::NotFound {
                    entity: "application",
                    id: key.clone(),
                })?;
            let mut application = loaded.doc;
            guard(&mut application, self.clock.now())?;

            match self.applications.update(&key, loaded.version, &application) {
                Ok(()) => return Ok(application),
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
