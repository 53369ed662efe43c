//! # Payment Processor
//!
//! Owns the payment records and reacts to the adoption lifecycle:
//!
//! - `adoption.approved` creates the payment record and reserves the fee.
//! - `payment.hold.request` (re)places the reservation, absorbing redelivery.
//! - `adoption.rejected` frees the reservation and fails the payment.
//!
//! Capture itself ([`PaymentProcessor::complete_payment`]) is not
//! event-driven; the adopter triggers it, and the resulting
//! `payment.completed` event is what advances the saga.

use crate::error::LedgerError;
use crate::journal::Applied;
use crate::ledger::{WalletLedger, COLLECTION_PAYMENTS, MAX_COMMIT_ATTEMPTS};
use async_trait::async_trait;
use chrono::Utc;
use shared_bus::{EventHandler, EventPayload, EventPublisher, HandlerError, Message};
use shared_store::{DocumentStore, StoreError, TypedCollection};
use shared_types::{
    AdoptionId, BusinessId, DomainError, Money, OwnerId, Payment, PaymentId, PaymentMethod,
    PaymentStatus, PetId, TransactionId, UserId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PaymentProcessor {
    payments: TypedCollection<Payment>,
    ledger: WalletLedger,
    publisher: Arc<dyn EventPublisher>,
}

impl PaymentProcessor {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ledger: WalletLedger,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            payments: TypedCollection::new(store, COLLECTION_PAYMENTS),
            ledger,
            publisher,
        }
    }

    /// Capture a pending payment on the adopter's behalf.
    ///
    /// Settlement reuses the transaction id minted when the payment record
    /// was created, so a retried capture lands in the journals at most once.
    /// A payment already `Completed` is returned as-is. Insufficient funds
    /// fail the payment record before the error propagates; the adopter can
    /// top up and retry while the application is still awaiting payment.
    pub async fn complete_payment(
        &self,
        user_id: UserId,
        adoption_id: AdoptionId,
    ) -> Result<Payment, LedgerError> {
        let key = adoption_id.to_string();
        let loaded = self
            .payments
            .get(&key)?
            .ok_or_else(|| DomainError::NotFound {
                entity: "payment",
                id: key.clone(),
            })?;
        let payment = loaded.doc;
        if payment.user_id != user_id {
            return Err(DomainError::Unauthorized {
                reason: "payment belongs to a different user".to_string(),
            }
            .into());
        }
        if payment.status == PaymentStatus::Completed {
            return Ok(payment);
        }

        self.mark_processing(adoption_id)?;
        match self
            .ledger
            .transfer(
                OwnerId::from(user_id),
                OwnerId::from(payment.business_id),
                payment.amount,
                adoption_id,
                payment.transaction_id,
            )
            .await
        {
            Ok(settled) => Ok(settled),
            Err(err) => {
                if matches!(
                    err,
                    LedgerError::Domain(DomainError::InsufficientFunds { .. })
                ) {
                    self.mark_failed(adoption_id)?;
                }
                Err(err)
            }
        }
    }

    /// The payment record for an adoption, if one has been created.
    pub fn payment(&self, adoption_id: AdoptionId) -> Result<Option<Payment>, LedgerError> {
        Ok(self.payments.get(&adoption_id.to_string())?.map(|v| v.doc))
    }

    /// Insert the payment record, or load the one a redelivery already
    /// inserted.
    fn ensure_payment(
        &self,
        adoption_id: AdoptionId,
        user_id: UserId,
        business_id: BusinessId,
        pet_id: PetId,
        amount: Money,
    ) -> Result<Payment, LedgerError> {
        let key = adoption_id.to_string();
        if let Some(existing) = self.payments.get(&key)? {
            return Ok(existing.doc);
        }
        let payment = Payment {
            id: PaymentId::new(),
            user_id,
            business_id,
            adoption_id,
            pet_id,
            amount,
            status: PaymentStatus::Pending,
            transaction_id: TransactionId::new(),
            payment_method: PaymentMethod::Wallet,
            completed_at: None,
            created_at: Utc::now(),
        };
        match self.payments.insert(&key, &payment) {
            Ok(()) => {
                info!(
                    adoption_id = %adoption_id,
                    payment_id = %payment.id,
                    amount = %amount,
                    "payment record created"
                );
                Ok(payment)
            }
            // Lost the insert race to a concurrent redelivery.
            Err(StoreError::VersionConflict { .. }) => Ok(self.payments.require(&key)?.doc),
            Err(e) => Err(e.into()),
        }
    }

    /// Reserve the fee and report the outcome on the bus.
    ///
    /// An already-open hold confirms again rather than staying silent: the
    /// redelivered request may mean the first confirmation was lost.
    async fn ensure_hold(
        &self,
        user_id: UserId,
        adoption_id: AdoptionId,
        amount: Money,
    ) -> Result<(), HandlerError> {
        match self
            .ledger
            .hold(OwnerId::from(user_id), TransactionId::new(), adoption_id, amount)
        {
            Ok(applied) => {
                if applied == Applied::Duplicate {
                    debug!(adoption_id = %adoption_id, "fee already reserved");
                }
                self.publisher
                    .publish(EventPayload::PaymentHoldConfirmed {
                        user_id,
                        adoption_id,
                        amount,
                    })
                    .await;
                Ok(())
            }
            Err(LedgerError::Domain(DomainError::InsufficientFunds {
                available,
                requested,
            })) => {
                warn!(
                    adoption_id = %adoption_id,
                    user_id = %user_id,
                    available = %available,
                    requested = %requested,
                    "fee reservation failed"
                );
                self.publisher
                    .publish(EventPayload::PaymentHoldFailed {
                        user_id,
                        adoption_id,
                        amount,
                        reason: format!(
                            "insufficient funds: {available} available, {requested} requested"
                        ),
                    })
                    .await;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn on_approved(
        &self,
        adoption_id: AdoptionId,
        user_id: UserId,
        business_id: BusinessId,
        pet_id: PetId,
        adoption_fee: Money,
    ) -> Result<(), HandlerError> {
        let payment = self.ensure_payment(adoption_id, user_id, business_id, pet_id, adoption_fee)?;
        if payment.status == PaymentStatus::Pending {
            self.ensure_hold(user_id, adoption_id, payment.amount).await?;
        } else {
            debug!(
                adoption_id = %adoption_id,
                status = %payment.status,
                "approval redelivered after payment left pending"
            );
        }
        Ok(())
    }

    async fn on_hold_request(
        &self,
        user_id: UserId,
        adoption_id: AdoptionId,
        amount: Money,
    ) -> Result<(), HandlerError> {
        // The hold request can arrive before the approval event created the
        // payment record; the reservation does not depend on it.
        let status = self.payment(adoption_id)?.map(|p| p.status);
        match status {
            None | Some(PaymentStatus::Pending) => {
                self.ensure_hold(user_id, adoption_id, amount).await
            }
            Some(status) => {
                debug!(
                    adoption_id = %adoption_id,
                    status = %status,
                    "hold request ignored, payment no longer pending"
                );
                Ok(())
            }
        }
    }

    async fn on_rejected(&self, adoption_id: AdoptionId) -> Result<(), HandlerError> {
        let Some(payment) = self.payment(adoption_id)? else {
            debug!(adoption_id = %adoption_id, "rejection with no payment record");
            return Ok(());
        };
        self.ledger.release(
            OwnerId::from(payment.user_id),
            TransactionId::new(),
            adoption_id,
        )?;
        self.mark_failed(adoption_id)?;
        info!(adoption_id = %adoption_id, "payment failed and reservation freed");
        Ok(())
    }

    /// Flip a pending (or previously failed, being retried) payment to
    /// `Processing`.
    fn mark_processing(&self, adoption_id: AdoptionId) -> Result<(), LedgerError> {
        self.flip_status(adoption_id, PaymentStatus::Processing, |status| {
            matches!(status, PaymentStatus::Pending | PaymentStatus::Failed)
        })
    }

    /// Flip a non-terminal payment to `Failed`.
    fn mark_failed(&self, adoption_id: AdoptionId) -> Result<(), LedgerError> {
        self.flip_status(adoption_id, PaymentStatus::Failed, |status| {
            matches!(status, PaymentStatus::Pending | PaymentStatus::Processing)
        })
    }

    fn flip_status(
        &self,
        adoption_id: AdoptionId,
        target: PaymentStatus,
        admissible: impl Fn(PaymentStatus) -> bool,
    ) -> Result<(), LedgerError> {
        let key = adoption_id.to_string();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(loaded) = self.payments.get(&key)? else {
                return Ok(());
            };
            if !admissible(loaded.doc.status) {
                return Ok(());
            }
            let mut payment = loaded.doc;
            payment.status = target;
            match self.payments.update(&key, loaded.version, &payment) {
                Ok(()) => return Ok(()),
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl EventHandler for PaymentProcessor {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        match &message.payload {
            EventPayload::AdoptionApproved {
                adoption_id,
                user_id,
                pet_id,
                business_id,
                adoption_fee,
            } => {
                self.on_approved(*adoption_id, *user_id, *business_id, *pet_id, *adoption_fee)
                    .await
            }
            EventPayload::PaymentHoldRequest {
                user_id,
                adoption_id,
                amount,
            } => self.on_hold_request(*user_id, *adoption_id, *amount).await,
            EventPayload::AdoptionRejected { adoption_id, .. } => {
                self.on_rejected(*adoption_id).await
            }
            _ => Err(HandlerError::new(format!(
                "unexpected payload on {}",
                message.routing_key
            ))),
        }
    }
}
