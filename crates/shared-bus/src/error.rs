//! Bus error types.

use shared_types::CorrelationId;
use std::fmt;
use thiserror::Error;

/// Errors from bus operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// No connection could be established after bounded retries. Fatal to
    /// the service's messaging capability.
    #[error("broker unavailable after {attempts} connection attempts")]
    BrokerUnavailable { attempts: u32 },

    /// No response arrived within the deadline. A hard ceiling, not a retry;
    /// the pending record has already been removed.
    #[error("request {correlation_id} timed out after {timeout_ms}ms")]
    Timeout {
        correlation_id: CorrelationId,
        timeout_ms: u64,
    },

    /// A queue with this name already has a consumer.
    #[error("queue already exists: {queue}")]
    QueueExists { queue: String },

    /// A routing key failed validation.
    #[error("invalid routing key: {key}")]
    InvalidRoutingKey { key: String },

    /// A binding pattern failed validation.
    #[error("invalid binding pattern: {pattern}")]
    InvalidPattern { pattern: String },

    /// The waiter for a pending request vanished before the response landed.
    #[error("response channel dropped for {correlation_id}")]
    ResponseDropped { correlation_id: CorrelationId },

    /// A response arrived with a payload variant the caller cannot use.
    #[error("unexpected response payload for {operation}")]
    UnexpectedResponse { operation: &'static str },
}

/// Why a handler rejected a delivery.
///
/// Deliberately not `std::error::Error`: the blanket `From` below lets
/// handlers use `?` on any error type, and the reason string is all the
/// dead-letter store keeps.
#[derive(Debug, Clone)]
pub struct HandlerError {
    reason: String,
}

impl HandlerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl<E: std::error::Error> From<E> for HandlerError {
    fn from(err: E) -> Self {
        Self::new(err.to_string())
    }
}
