//! # Platform Runtime
//!
//! The composition root for the adoption platform. One process hosts every
//! service; they still only talk through the bus and the shared document
//! store, so splitting them into separate processes later is a wiring
//! change, not a redesign.
//!
//! - [`config`]: defaults, environment overrides, validation.
//! - [`platform`]: broker connection, store selection, queue bindings,
//!   consumer tasks, RPC clients, and the reaper.

pub mod config;
pub mod platform;

pub use config::{load_config, ConfigError, PlatformConfig, StorageBackend};
pub use platform::Platform;
