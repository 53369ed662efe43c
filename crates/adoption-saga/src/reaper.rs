//! # Payment Window Reaper
//!
//! Rejection by timeout: an approved application the adopter never pays for
//! would otherwise pin its pet on `Booked` and its fee hold forever. The
//! reaper periodically rejects applications stuck in `PaymentPending` past
//! the payment window; the resulting `adoption.rejected` event releases the
//! hold and frees the pet like any other rejection.

use crate::coordinator::AdoptionSaga;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the reaper task. Stops on the shutdown signal.
pub fn spawn_reaper(
    saga: Arc<AdoptionSaga>,
    window: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("reaper stopped");
                        break;
                    }
                }
                _ = tick.tick() => {
                    match saga.expire_stuck_payments(window).await {
                        Ok(0) => {}
                        Ok(expired) => {
                            info!(expired, "expired applications past the payment window");
                        }
                        Err(err) => warn!(error = %err, "reaper sweep failed"),
                    }
                }
            }
        }
    })
}
