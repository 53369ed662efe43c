//! # Cross-Service Integration
//!
//! Every test here drives more than one service crate through the shared
//! broker and document store, the same wiring the runtime uses, with a
//! manual clock and short RPC deadlines so nothing sleeps for real.

pub mod harness;

mod adoption_flow;
mod resilience;
mod wallet_properties;
