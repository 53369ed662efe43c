//! Saga error type.

use shared_bus::BusError;
use shared_store::StoreError;
use shared_types::DomainError;
use thiserror::Error;

/// Errors from saga operations.
///
/// Timeouts waiting for a validation response surface as
/// [`DomainError::ValidationTimeout`], not as a bus error; the caller can
/// retry the whole operation without knowing about correlation ids.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bus(#[from] BusError),
}
