//! # Shared Store - Versioned Document Storage
//!
//! Every service keeps its documents behind the [`DocumentStore`] port:
//! JSON documents grouped into named collections, each carrying a version
//! counter bumped on every write.
//!
//! Two rules make the concurrency model of the whole platform work:
//!
//! - **Optimistic single-writer**: updates name the version they read;
//!   a mismatch fails the whole commit with [`StoreError::VersionConflict`]
//!   and the caller re-reads and retries. This serializes writers per
//!   document without any lock being held across an await point.
//! - **Atomic batches**: a [`WriteBatch`] of inserts and updates across any
//!   number of documents and collections applies all-or-nothing. The wallet
//!   transfer (two wallets plus the payment record) rides on this.
//!
//! Adapters: [`MemoryStore`] always; `RocksDbStore` behind the `rocksdb`
//! cargo feature for durable single-node deployments.

pub mod error;
pub mod memory;
pub mod port;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod typed;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use port::{DocumentStore, VersionedDoc, WriteBatch, WriteOp};
#[cfg(feature = "rocksdb")]
pub use rocks::{RocksDbConfig, RocksDbStore};
pub use typed::{TypedCollection, Versioned};
