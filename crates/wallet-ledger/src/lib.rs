//! # Wallet Ledger Service
//!
//! The money side of the platform: one wallet per party (user or business),
//! holds that reserve funds without moving them, and an append-only journal
//! recording every balance mutation.
//!
//! ## Invariants
//!
//! - `balance - sum(open holds) >= 0` at all times; no operation may drive
//!   available funds negative.
//! - Every balance mutation appends exactly one journal entry whose
//!   transaction id was generated by the caller *before* the call. An id
//!   already present in the journal makes the operation a duplicate no-op,
//!   so a crash-retried transfer lands at most once.
//! - Wallet mutation is serialized per owner through the store's optimistic
//!   version check; conflicting writers retry.
//!
//! ## Responsibilities
//!
//! - **Journal** ([`journal`]): the pure validate-then-apply operations on a
//!   single wallet document.
//! - **Ledger service** ([`ledger`]): credit / debit / hold / release /
//!   transfer against the store, with the transfer applying both wallet legs
//!   and the payment record as one atomic batch.
//! - **Payment processor** ([`processor`]): consumes `adoption.approved`,
//!   `payment.hold.request`, and `adoption.rejected`; places and releases
//!   fee holds; captures payment on demand.

pub mod error;
pub mod journal;
pub mod ledger;
pub mod processor;

pub use error::LedgerError;
pub use journal::Applied;
pub use ledger::{WalletLedger, COLLECTION_PAYMENTS, COLLECTION_WALLETS};
pub use processor::PaymentProcessor;
