//! Ledger error type.

use shared_store::StoreError;
use shared_types::DomainError;
use thiserror::Error;

/// Errors from wallet and payment operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
