//! # Core Domain Entities
//!
//! The documents and value types the orchestration layer works with.
//!
//! ## Clusters
//!
//! - **Adoption**: `AdoptionApplication`, `ApplicationStatus`, `PaymentStamp`
//! - **Wallet**: `Wallet`, `Hold`, `LedgerEntry`, `EntryKind`
//! - **Payment**: `Payment`, `PaymentStatus`, `PaymentMethod`
//! - **Catalog**: `Pet`, `PetAvailability`, `PetSummary`, `Business`
//!
//! None of these documents is ever physically deleted; applications and
//! ledger journals are the audit trail.

use crate::ids::{
    AdoptionId, BusinessId, OwnerId, PaymentId, PetId, TransactionId, UserId,
};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: ADOPTION
// =============================================================================

/// Lifecycle of an adoption application.
///
/// `Completed` and `Rejected` are terminal; every transition is guarded by
/// the current status, which doubles as the concurrency guard under
/// duplicate or out-of-order event delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Submitted, awaiting the business's decision.
    Pending,
    /// Approved; waiting for the adopter's payment.
    PaymentPending,
    /// Paid and finalized.
    Completed,
    /// Declined by the business, expired, or failed payment hold.
    Rejected,
}

impl ApplicationStatus {
    /// Terminal states admit no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::PaymentPending => write!(f, "payment_pending"),
            Self::Completed => write!(f, "completed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Payment bookkeeping stamped onto an application when it completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaymentStamp {
    pub payment_id: Option<PaymentId>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

/// An adoption application, the saga's persistent state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdoptionApplication {
    pub id: AdoptionId,
    pub pet_id: PetId,
    pub user_id: UserId,
    /// Owning party, resolved during pet validation.
    pub business_id: BusinessId,
    pub status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    pub payment: PaymentStamp,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdoptionApplication {
    /// A fresh `Pending` application.
    #[must_use]
    pub fn new(
        pet_id: PetId,
        user_id: UserId,
        business_id: BusinessId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AdoptionId::new(),
            pet_id,
            user_id,
            business_id,
            status: ApplicationStatus::Pending,
            rejection_reason: None,
            payment: PaymentStamp::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Storage key for the application document.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.id.to_string()
    }
}

// =============================================================================
// CLUSTER B: WALLET
// =============================================================================

/// Funds reserved against a wallet without moving the balance.
///
/// A hold reduces available (spendable) funds; `balance` itself is only
/// moved by credit, debit, and transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    /// The adoption this reservation belongs to.
    pub reference_id: AdoptionId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

/// What a journal entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Credit,
    Debit,
    Hold,
    Release,
    Transfer,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credit => write!(f, "credit"),
            Self::Debit => write!(f, "debit"),
            Self::Hold => write!(f, "hold"),
            Self::Release => write!(f, "release"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

/// One immutable line in a wallet's append-only journal.
///
/// The `transaction_id` is generated by the caller before the mutating call;
/// the ledger deduplicates on it, so a crash-retried operation lands at most
/// once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub kind: EntryKind,
    pub amount: Money,
    pub description: String,
    pub reference_id: Option<AdoptionId>,
    pub created_at: DateTime<Utc>,
}

/// A party's wallet: balance, open holds, and the journal.
///
/// Invariant: `balance - sum(holds) >= 0` at all times, and every balance
/// mutation appends exactly one journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub owner_id: OwnerId,
    pub balance: Money,
    pub holds: Vec<Hold>,
    pub transactions: Vec<LedgerEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// An empty wallet, created lazily on first credit.
    #[must_use]
    pub fn new(owner_id: OwnerId, now: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            balance: Money::ZERO,
            holds: Vec::new(),
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Total currently reserved by open holds.
    #[must_use]
    pub fn held_total(&self) -> Money {
        self.holds.iter().map(|h| h.amount).sum()
    }

    /// Spendable funds: balance minus open holds.
    #[must_use]
    pub fn available(&self) -> Money {
        self.balance.saturating_sub(self.held_total())
    }

    /// The open hold for an adoption, if any.
    #[must_use]
    pub fn find_hold(&self, reference_id: AdoptionId) -> Option<&Hold> {
        self.holds.iter().find(|h| h.reference_id == reference_id)
    }

    /// Whether a transaction id already appears in the journal.
    #[must_use]
    pub fn has_transaction(&self, transaction_id: TransactionId) -> bool {
        self.transactions
            .iter()
            .any(|t| t.transaction_id == transaction_id)
    }
}

// =============================================================================
// CLUSTER C: PAYMENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Settled from the adopter's platform wallet.
    Wallet,
    /// Settled by an external gateway (out of scope here, kept for the
    /// contract vocabulary).
    Card,
}

/// A payment for an approved adoption.
///
/// Created when the adoption is approved; flipped to `Completed` only in the
/// same atomic batch as both wallet legs of the transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub business_id: BusinessId,
    pub adoption_id: AdoptionId,
    pub pet_id: PetId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub transaction_id: TransactionId,
    pub payment_method: PaymentMethod,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// CLUSTER D: CATALOG
// =============================================================================

/// Where a pet sits in the adoption lifecycle.
///
/// Maintained purely by consuming adoption events; duplicate deliveries are
/// absorbed by last-write-wins field sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetAvailability {
    Available,
    Booked,
    Adopted,
}

impl fmt::Display for PetAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Booked => write!(f, "booked"),
            Self::Adopted => write!(f, "adopted"),
        }
    }
}

/// A pet in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: PetId,
    pub name: String,
    pub business_id: BusinessId,
    pub adoption_fee: Money,
    pub availability: PetAvailability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a pet the validation response carries across services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetSummary {
    pub pet_id: PetId,
    pub name: String,
    pub adoption_fee: Money,
}

impl From<&Pet> for PetSummary {
    fn from(pet: &Pet) -> Self {
        Self {
            pet_id: pet.id,
            name: pet.name.clone(),
            adoption_fee: pet.adoption_fee,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessStatus {
    Active,
    Suspended,
}

impl fmt::Display for BusinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// A business or shelter that lists pets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    pub status: BusinessStatus,
    pub created_at: DateTime<Utc>,
}
