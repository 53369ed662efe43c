//! # Adoption Saga
//!
//! Coordinates one adoption application from submission to a terminal state,
//! across services that only talk through the bus.
//!
//! ## Flow
//!
//! 1. **Apply**: validate the pet over correlation RPC (the pet registry in
//!    turn validates its business), reject duplicates, persist `Pending`.
//! 2. **Decide**: the business approves (`Pending -> PaymentPending`, emits
//!    `adoption.approved` and `payment.hold.request`) or rejects
//!    (`Pending -> Rejected`, emits `adoption.rejected`).
//! 3. **Settle**: `payment.completed` marks the application paid and
//!    completed; `payment.hold.failed` rejects it. Both arrive at-least-once
//!    and are absorbed by the status guards.
//!
//! Applications stuck in `PaymentPending` past the payment window are
//! rejected by the [`reaper`].

pub mod clock;
pub mod consumers;
pub mod coordinator;
pub mod error;
pub mod reaper;
pub mod transitions;

pub use clock::{Clock, ManualClock, SystemClock};
pub use consumers::PaymentEventsHandler;
pub use coordinator::{AdoptionSaga, COLLECTION_APPLICATIONS};
pub use error::SagaError;
pub use reaper::spawn_reaper;
pub use transitions::Transition;
