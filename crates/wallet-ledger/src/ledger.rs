//! # Wallet Ledger Service
//!
//! Journal operations bound to the store: each call is a load-mutate-commit
//! loop on the owner's wallet document, retried on version conflict. The
//! transfer is the one multi-document operation; both wallet legs and the
//! payment record flip inside a single atomic batch, and the
//! `payment.completed` event is published only after that batch is durable.

use crate::error::LedgerError;
use crate::journal::{self, Applied};
use chrono::{DateTime, Utc};
use shared_bus::{EventPayload, EventPublisher};
use shared_store::{DocumentStore, StoreError, TypedCollection, WriteBatch};
use shared_types::{
    AdoptionId, DomainError, Money, OwnerId, Payment, PaymentStatus, TransactionId, Wallet,
};
use std::sync::Arc;
use tracing::{debug, info};

pub const COLLECTION_WALLETS: &str = "wallets";
pub const COLLECTION_PAYMENTS: &str = "payments";

pub(crate) const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Balance operations on wallet documents.
#[derive(Clone)]
pub struct WalletLedger {
    wallets: TypedCollection<Wallet>,
    payments: TypedCollection<Payment>,
    publisher: Arc<dyn EventPublisher>,
}

impl WalletLedger {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            wallets: TypedCollection::new(Arc::clone(&store), COLLECTION_WALLETS),
            payments: TypedCollection::new(store, COLLECTION_PAYMENTS),
            publisher,
        }
    }

    pub fn wallet(&self, owner: OwnerId) -> Result<Option<Wallet>, LedgerError> {
        Ok(self.wallets.get(&owner.storage_key())?.map(|v| v.doc))
    }

    /// The payment record for an adoption, keyed by adoption id.
    pub fn payment(&self, adoption_id: AdoptionId) -> Result<Option<Payment>, LedgerError> {
        Ok(self.payments.get(&adoption_id.to_string())?.map(|v| v.doc))
    }

    /// Add funds. Creates the wallet on first credit.
    pub fn credit(
        &self,
        owner: OwnerId,
        transaction_id: TransactionId,
        amount: Money,
        description: &str,
    ) -> Result<Applied, LedgerError> {
        self.mutate(owner, true, |wallet, now| {
            journal::credit(wallet, transaction_id, amount, description, now)
        })
    }

    /// Withdraw available funds. The wallet must exist.
    pub fn debit(
        &self,
        owner: OwnerId,
        transaction_id: TransactionId,
        amount: Money,
        description: &str,
    ) -> Result<Applied, LedgerError> {
        self.mutate(owner, false, |wallet, now| {
            journal::debit(wallet, transaction_id, amount, description, now)
        })
    }

    /// Reserve funds against an adoption.
    ///
    /// A missing wallet is treated as an empty one, so the caller gets
    /// `InsufficientFunds { available: 0 }` rather than not-found; nothing
    /// is persisted when the reservation fails.
    pub fn hold(
        &self,
        owner: OwnerId,
        transaction_id: TransactionId,
        reference_id: AdoptionId,
        amount: Money,
    ) -> Result<Applied, LedgerError> {
        self.mutate(owner, true, |wallet, now| {
            journal::hold(wallet, transaction_id, reference_id, amount, now)
        })
    }

    /// Free the hold for an adoption. Absent wallet or hold is a no-op.
    pub fn release(
        &self,
        owner: OwnerId,
        transaction_id: TransactionId,
        reference_id: AdoptionId,
    ) -> Result<Applied, LedgerError> {
        let key = owner.storage_key();
        if self.wallets.get(&key)?.is_none() {
            debug!(owner = %owner, "release against a wallet that was never created");
            return Ok(Applied::Duplicate);
        }
        self.mutate(owner, false, |wallet, now| {
            Ok(journal::release(wallet, transaction_id, reference_id, now))
        })
    }

    /// Settle an adoption fee: payer leg, payee leg, and the payment record
    /// commit as one batch.
    ///
    /// The payment document keyed by `reference_id` must already exist; a
    /// payment found `Completed` returns it as-is without touching wallets
    /// or publishing, which is what makes a crash-retried settlement safe.
    pub async fn transfer(
        &self,
        from: OwnerId,
        to: OwnerId,
        amount: Money,
        reference_id: AdoptionId,
        transaction_id: TransactionId,
    ) -> Result<Payment, LedgerError> {
        let payment_key = reference_id.to_string();
        let from_key = from.storage_key();
        let to_key = to.storage_key();

        let mut attempt = 0;
        let committed = loop {
            attempt += 1;
            let now = Utc::now();

            let loaded_payment =
                self.payments
                    .get(&payment_key)?
                    .ok_or_else(|| DomainError::NotFound {
                        entity: "payment",
                        id: payment_key.clone(),
                    })?;
            let mut payment = loaded_payment.doc;
            if payment.status == PaymentStatus::Completed {
                debug!(adoption_id = %reference_id, "transfer already settled");
                return Ok(payment);
            }

            let loaded_payer =
                self.wallets
                    .get(&from_key)?
                    .ok_or_else(|| DomainError::NotFound {
                        entity: "wallet",
                        id: from_key.clone(),
                    })?;
            let mut payer = loaded_payer.doc;
            let out = journal::transfer_out(&mut payer, transaction_id, reference_id, amount, now)?;

            let (mut payee, payee_version) = match self.wallets.get(&to_key)? {
                Some(v) => (v.doc, Some(v.version)),
                None => (Wallet::new(to, now), None),
            };
            let incoming =
                journal::transfer_in(&mut payee, transaction_id, reference_id, amount, now)?;

            payment.status = PaymentStatus::Completed;
            payment.transaction_id = transaction_id;
            payment.completed_at = Some(now);

            let mut batch = WriteBatch::new();
            if out == Applied::Fresh {
                batch.push(
                    self.wallets
                        .update_op(&from_key, loaded_payer.version, &payer)?,
                );
            }
            if incoming == Applied::Fresh {
                batch.push(match payee_version {
                    Some(version) => self.wallets.update_op(&to_key, version, &payee)?,
                    None => self.wallets.insert_op(&to_key, &payee)?,
                });
            }
            batch.push(
                self.payments
                    .update_op(&payment_key, loaded_payment.version, &payment)?,
            );

            match self.payments.commit(batch) {
                Ok(()) => break payment,
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        };

        info!(
            adoption_id = %reference_id,
            payment_id = %committed.id,
            amount = %committed.amount,
            from = %from,
            to = %to,
            "payment settled"
        );
        self.publisher
            .publish(EventPayload::PaymentCompleted {
                payment: committed.clone(),
            })
            .await;
        Ok(committed)
    }

    /// Load-or-create, apply a journal op, commit with version retry.
    ///
    /// Duplicates skip the write entirely; a failed op never persists a
    /// lazily created wallet.
    fn mutate<F>(
        &self,
        owner: OwnerId,
        create_if_missing: bool,
        mut op: F,
    ) -> Result<Applied, LedgerError>
    where
        F: FnMut(&mut Wallet, DateTime<Utc>) -> Result<Applied, DomainError>,
    {
        let key = owner.storage_key();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = Utc::now();
            let (mut wallet, version) = match self.wallets.get(&key)? {
                Some(v) => (v.doc, Some(v.version)),
                None if create_if_missing => (Wallet::new(owner, now), None),
                None => {
                    return Err(DomainError::NotFound {
                        entity: "wallet",
                        id: key,
                    }
                    .into())
                }
            };

            let applied = op(&mut wallet, now)?;
            if applied.is_duplicate() {
                return Ok(applied);
            }

            let result = match version {
                Some(version) => self.wallets.update(&key, version, &wallet),
                None => self.wallets.insert(&key, &wallet),
            };
            match result {
                Ok(()) => return Ok(applied),
                Err(StoreError::VersionConflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
