//! # Correlation RPC
//!
//! Turns fire-and-forget publish plus a later response message into an
//! awaitable call. Flow:
//!
//! 1. `call` registers a pending entry (oneshot) **before** publishing.
//! 2. The request is published carrying the correlation id.
//! 3. A per-process dispatcher consumes the response queue
//!    (`X.validation.response.*`), extracts the id, and completes the entry.
//! 4. `call` awaits the oneshot under a deadline; on elapse the entry is
//!    removed and [`BusError::Timeout`] returned — a hard ceiling, callers
//!    decide whether to retry.
//!
//! A response arriving after its entry is gone is a no-op: counted, debug
//! logged, never an error.

use crate::broker::InMemoryBroker;
use crate::error::BusError;
use crate::events::EventPayload;
use crate::publisher::EventPublisher;
use crate::routing::BindingPattern;
use dashmap::DashMap;
use shared_types::CorrelationId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, warn};

/// Deadline applied to every call unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the sweeper evicts entries nobody is awaiting anymore.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

struct PendingRequest {
    sender: oneshot::Sender<EventPayload>,
    created_at: Instant,
    /// Operation name, for logging only.
    operation: &'static str,
    timeout: Duration,
}

/// Counters for the pending-request table.
#[derive(Debug, Default)]
pub struct RpcStats {
    registered: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    dropped_late: AtomicU64,
}

impl RpcStats {
    #[must_use]
    pub fn registered(&self) -> u64 {
        self.registered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Responses that arrived after their entry was gone.
    #[must_use]
    pub fn dropped_late(&self) -> u64 {
        self.dropped_late.load(Ordering::Relaxed)
    }
}

/// Table of correlation ids to waiting callers.
///
/// Entries are removed on every exit path (response, timeout cancel,
/// sweeper) so the table never grows unbounded.
pub struct PendingRequestStore {
    pending: DashMap<CorrelationId, PendingRequest>,
    default_timeout: Duration,
    stats: RpcStats,
}

impl PendingRequestStore {
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            default_timeout,
            stats: RpcStats::default(),
        }
    }

    /// Register a fresh pending entry and return its id and receiver.
    ///
    /// Must be called before the request is published, or a fast response
    /// could arrive with nowhere to land.
    pub fn register(
        &self,
        operation: &'static str,
        timeout: Option<Duration>,
    ) -> (CorrelationId, oneshot::Receiver<EventPayload>) {
        let correlation_id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest {
            sender: tx,
            created_at: Instant::now(),
            operation,
            timeout: timeout.unwrap_or(self.default_timeout),
        };

        // Freshly generated v4 ids do not collide in practice; a hit here
        // is a programming error, but release builds replace the entry and
        // carry on rather than wedging two callers.
        if self.pending.insert(correlation_id, request).is_some() {
            debug_assert!(false, "duplicate correlation id {correlation_id}");
            error!(
                correlation_id = %correlation_id,
                operation,
                "duplicate correlation id registered, previous waiter replaced"
            );
        }
        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        debug!(correlation_id = %correlation_id, operation, "pending request registered");

        (correlation_id, rx)
    }

    /// Resolve the waiter for `correlation_id` with a response payload.
    ///
    /// Returns false when no entry exists (late or unknown response) or the
    /// waiter already gave up; both are no-ops by contract.
    pub fn complete(&self, correlation_id: CorrelationId, payload: EventPayload) -> bool {
        let Some((_, pending)) = self.pending.remove(&correlation_id) else {
            self.stats.dropped_late.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %correlation_id, "late or unknown response dropped");
            return false;
        };

        let elapsed = pending.created_at.elapsed();
        match pending.sender.send(payload) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    operation = pending.operation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "pending request completed"
                );
                true
            }
            Err(_) => {
                // Caller stopped waiting between our remove and send.
                self.stats.dropped_late.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    operation = pending.operation,
                    "response arrived for an abandoned waiter"
                );
                false
            }
        }
    }

    /// Drop the entry for a caller that gave up. Returns false if the
    /// entry was already gone.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Evict entries older than their deadline. Returns how many were
    /// removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.pending.retain(|id, request| {
            let elapsed = now.duration_since(request.created_at);
            if elapsed > request.timeout {
                warn!(
                    correlation_id = %id,
                    operation = request.operation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "evicting expired pending request"
                );
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    #[must_use]
    pub fn stats(&self) -> &RpcStats {
        &self.stats
    }
}

/// Awaitable request/reply over the one-way bus.
///
/// One client per service process: it owns the response queue subscription
/// and the pending table shared by every in-flight call.
pub struct RpcClient {
    broker: Arc<InMemoryBroker>,
    pending: Arc<PendingRequestStore>,
}

impl RpcClient {
    /// Subscribe to the response patterns and start the dispatcher and
    /// sweeper tasks. Both stop on the shutdown signal.
    pub fn start(
        broker: Arc<InMemoryBroker>,
        response_queue: impl Into<String>,
        response_patterns: Vec<BindingPattern>,
        default_timeout: Duration,
        sweep_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Arc<Self>, BusError> {
        let mut subscription = broker.subscribe(response_queue, response_patterns)?;
        let pending = Arc::new(PendingRequestStore::new(default_timeout));

        let dispatcher_pending = Arc::clone(&pending);
        let mut dispatcher_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = dispatcher_shutdown.changed() => {
                        if changed.is_err() || *dispatcher_shutdown.borrow() {
                            debug!(queue = %subscription.queue(), "rpc dispatcher stopped");
                            break;
                        }
                    }
                    maybe = subscription.recv() => {
                        let Some(message) = maybe else { break; };
                        match message.payload.correlation_id() {
                            Some(correlation_id) => {
                                dispatcher_pending.complete(correlation_id, message.payload.clone());
                                subscription.ack(&message);
                            }
                            None => subscription
                                .reject(message, "response payload without correlation id"),
                        }
                    }
                }
            }
        });

        let sweeper_pending = Arc::clone(&pending);
        let mut sweeper_shutdown = shutdown;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(sweep_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    changed = sweeper_shutdown.changed() => {
                        if changed.is_err() || *sweeper_shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tick.tick() => {
                        let removed = sweeper_pending.remove_expired();
                        if removed > 0 {
                            debug!(removed, "swept expired pending requests");
                        }
                    }
                }
            }
        });

        Ok(Arc::new(Self { broker, pending }))
    }

    /// Publish the request built by `make_request` and await its response.
    ///
    /// The pending entry is registered before publishing. On deadline the
    /// entry is cancelled and [`BusError::Timeout`] returned; no internal
    /// retry.
    pub async fn call<F>(
        &self,
        operation: &'static str,
        timeout: Option<Duration>,
        make_request: F,
    ) -> Result<EventPayload, BusError>
    where
        F: FnOnce(CorrelationId) -> EventPayload,
    {
        let timeout = timeout.unwrap_or(self.pending.default_timeout());
        let (correlation_id, rx) = self.pending.register(operation, Some(timeout));

        let reached = self.broker.publish(make_request(correlation_id)).await;
        if reached == 0 {
            debug!(operation, correlation_id = %correlation_id, "request reached no responder");
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => {
                // Sweeper evicted the entry while we were still waiting.
                Err(BusError::ResponseDropped { correlation_id })
            }
            Err(_) => {
                self.pending.cancel(&correlation_id);
                Err(BusError::Timeout {
                    correlation_id,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    #[must_use]
    pub fn pending(&self) -> &PendingRequestStore {
        &self.pending
    }
}
