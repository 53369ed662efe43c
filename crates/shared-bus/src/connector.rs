//! # Broker Connection
//!
//! On process start a service dials its broker with fixed backoff up to a
//! bounded attempt count. Exhausting the bound yields
//! [`BusError::BrokerUnavailable`], which the runtime must treat as fatal:
//! a service without messaging never runs degraded.

use crate::broker::InMemoryBroker;
use crate::error::BusError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Fixed-backoff connect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Dial attempts before giving up.
    pub max_attempts: u32,
    /// Fixed delay between attempts; no jitter, no exponent.
    pub backoff: Duration,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(500),
        }
    }
}

/// How a service reaches its broker.
///
/// The in-process broker has [`InMemoryDialer`]; a deployment against a
/// networked broker supplies its own dialer behind the same seam.
#[async_trait]
pub trait BrokerDialer: Send + Sync {
    type Conn: Send;

    async fn dial(&self) -> Result<Self::Conn, Box<dyn std::error::Error + Send + Sync>>;
}

/// Dial until connected or the attempt bound is exhausted.
pub async fn connect<D: BrokerDialer>(
    dialer: &D,
    policy: ReconnectPolicy,
) -> Result<D::Conn, BusError> {
    for attempt in 1..=policy.max_attempts {
        match dialer.dial().await {
            Ok(conn) => {
                info!(attempt, "broker connection established");
                return Ok(conn);
            }
            Err(reason) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %reason,
                    "broker dial failed"
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
    Err(BusError::BrokerUnavailable {
        attempts: policy.max_attempts,
    })
}

/// Dialer for the in-process broker; never fails.
pub struct InMemoryDialer {
    broker: Arc<InMemoryBroker>,
}

impl InMemoryDialer {
    #[must_use]
    pub fn new(broker: Arc<InMemoryBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl BrokerDialer for InMemoryDialer {
    type Conn = Arc<InMemoryBroker>;

    async fn dial(&self) -> Result<Self::Conn, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Arc::clone(&self.broker))
    }
}
