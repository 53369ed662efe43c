//! Registry error type.

use shared_store::StoreError;
use shared_types::DomainError;
use thiserror::Error;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
