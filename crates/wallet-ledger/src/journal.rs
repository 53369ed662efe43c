//! # Journal Operations
//!
//! The pure core of the ledger: each operation validates against the
//! wallet's current state, then mutates it and appends exactly one journal
//! entry. Nothing here touches the store; [`crate::ledger`] wraps these in
//! load-mutate-commit loops.
//!
//! Every operation checks the caller-generated transaction id against the
//! journal first and returns [`Applied::Duplicate`] without mutating when it
//! has already been applied. Redelivered messages and crash-retried calls
//! land here as no-ops.

use chrono::{DateTime, Utc};
use shared_types::{
    AdoptionId, DomainError, EntryKind, Hold, LedgerEntry, Money, TransactionId, Wallet,
};

/// Whether an operation mutated the wallet or deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The operation mutated the wallet and appended a journal entry.
    Fresh,
    /// The operation had already been applied; the wallet is unchanged.
    Duplicate,
}

impl Applied {
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

fn append(
    wallet: &mut Wallet,
    transaction_id: TransactionId,
    kind: EntryKind,
    amount: Money,
    description: String,
    reference_id: Option<AdoptionId>,
    now: DateTime<Utc>,
) {
    wallet.transactions.push(LedgerEntry {
        transaction_id,
        kind,
        amount,
        description,
        reference_id,
        created_at: now,
    });
    wallet.updated_at = now;
}

/// Increase the balance.
pub fn credit(
    wallet: &mut Wallet,
    transaction_id: TransactionId,
    amount: Money,
    description: &str,
    now: DateTime<Utc>,
) -> Result<Applied, DomainError> {
    if wallet.has_transaction(transaction_id) {
        return Ok(Applied::Duplicate);
    }
    wallet.balance = wallet
        .balance
        .checked_add(amount)
        .ok_or_else(|| DomainError::InvalidInput {
            reason: "balance overflow".to_string(),
        })?;
    append(
        wallet,
        transaction_id,
        EntryKind::Credit,
        amount,
        description.to_string(),
        None,
        now,
    );
    Ok(Applied::Fresh)
}

/// Decrease the balance; fails if available funds would go negative.
pub fn debit(
    wallet: &mut Wallet,
    transaction_id: TransactionId,
    amount: Money,
    description: &str,
    now: DateTime<Utc>,
) -> Result<Applied, DomainError> {
    if wallet.has_transaction(transaction_id) {
        return Ok(Applied::Duplicate);
    }
    let available = wallet.available();
    if available < amount {
        return Err(DomainError::InsufficientFunds {
            available,
            requested: amount,
        });
    }
    // Available >= amount implies balance >= amount, holds are non-negative.
    wallet.balance = wallet.balance.saturating_sub(amount);
    append(
        wallet,
        transaction_id,
        EntryKind::Debit,
        amount,
        description.to_string(),
        None,
        now,
    );
    Ok(Applied::Fresh)
}

/// Reserve funds against an adoption without moving the balance.
///
/// Duplicate-safe two ways: by transaction id like every operation, and by
/// reference — an open hold for the same adoption makes this a no-op, so a
/// redelivered hold request never reserves twice.
pub fn hold(
    wallet: &mut Wallet,
    transaction_id: TransactionId,
    reference_id: AdoptionId,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<Applied, DomainError> {
    if wallet.has_transaction(transaction_id) || wallet.find_hold(reference_id).is_some() {
        return Ok(Applied::Duplicate);
    }
    let available = wallet.available();
    if available < amount {
        return Err(DomainError::InsufficientFunds {
            available,
            requested: amount,
        });
    }
    wallet.holds.push(Hold {
        reference_id,
        amount,
        created_at: now,
    });
    append(
        wallet,
        transaction_id,
        EntryKind::Hold,
        amount,
        format!("hold for adoption {reference_id}"),
        Some(reference_id),
        now,
    );
    Ok(Applied::Fresh)
}

/// Remove the open hold for an adoption.
///
/// A missing hold is a duplicate no-op, never an error: release rides on
/// at-least-once events and must absorb redelivery. The release entry is
/// appended only when a hold was actually removed.
pub fn release(
    wallet: &mut Wallet,
    transaction_id: TransactionId,
    reference_id: AdoptionId,
    now: DateTime<Utc>,
) -> Applied {
    if wallet.has_transaction(transaction_id) {
        return Applied::Duplicate;
    }
    let Some(position) = wallet
        .holds
        .iter()
        .position(|h| h.reference_id == reference_id)
    else {
        return Applied::Duplicate;
    };
    let freed = wallet.holds.remove(position);
    append(
        wallet,
        transaction_id,
        EntryKind::Release,
        freed.amount,
        format!("release hold for adoption {reference_id}"),
        Some(reference_id),
        now,
    );
    Applied::Fresh
}

/// The outgoing leg of a transfer: consume the matching hold and debit.
///
/// The hold for `reference_id` is released inside the same mutation as the
/// debit; without that, a payer whose balance is fully held could never pay
/// the very adoption the hold reserves for.
pub fn transfer_out(
    wallet: &mut Wallet,
    transaction_id: TransactionId,
    reference_id: AdoptionId,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<Applied, DomainError> {
    if wallet.has_transaction(transaction_id) {
        return Ok(Applied::Duplicate);
    }
    let reserved = wallet
        .find_hold(reference_id)
        .map_or(Money::ZERO, |h| h.amount);
    let spendable = wallet
        .available()
        .checked_add(reserved)
        .unwrap_or(Money::from_minor(u64::MAX));
    if spendable < amount {
        return Err(DomainError::InsufficientFunds {
            available: spendable,
            requested: amount,
        });
    }
    wallet.holds.retain(|h| h.reference_id != reference_id);
    wallet.balance = wallet.balance.saturating_sub(amount);
    append(
        wallet,
        transaction_id,
        EntryKind::Transfer,
        amount,
        format!("transfer out for adoption {reference_id}"),
        Some(reference_id),
        now,
    );
    Ok(Applied::Fresh)
}

/// The incoming leg of a transfer.
pub fn transfer_in(
    wallet: &mut Wallet,
    transaction_id: TransactionId,
    reference_id: AdoptionId,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<Applied, DomainError> {
    if wallet.has_transaction(transaction_id) {
        return Ok(Applied::Duplicate);
    }
    wallet.balance = wallet
        .balance
        .checked_add(amount)
        .ok_or_else(|| DomainError::InvalidInput {
            reason: "balance overflow".to_string(),
        })?;
    append(
        wallet,
        transaction_id,
        EntryKind::Transfer,
        amount,
        format!("transfer in for adoption {reference_id}"),
        Some(reference_id),
        now,
    );
    Ok(Applied::Fresh)
}
