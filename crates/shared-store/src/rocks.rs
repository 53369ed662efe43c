//! RocksDB implementation of the document store.
//!
//! Durable single-node backend. Each document is stored under
//! `<collection>/<id>` with an 8-byte big-endian version prefix ahead of the
//! JSON bytes, so version checks never deserialize the document. Batch
//! commits ride on RocksDB's `WriteBatch`; version validation happens under
//! the store's write lock, which closes the check-then-write race.

use crate::error::StoreError;
use crate::port::{DocumentStore, VersionedDoc, WriteBatch, WriteOp};
use parking_lot::RwLock;
use rocksdb::{IteratorMode, Options, WriteBatch as RocksBatch, DB};
use std::path::Path;

/// RocksDB tuning knobs.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory.
    pub path: String,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Fsync after each write (durability over throughput).
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/pawhaven".to_string(),
            write_buffer_size: 64 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Config for tests: tiny buffers, no fsync.
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed document store.
pub struct RocksDbStore {
    db: RwLock<DB>,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = DB::open(&opts, &config.path)
            .map_err(|e| StoreError::Backend(format!("failed to open RocksDB: {e}")))?;

        Ok(Self {
            db: RwLock::new(db),
            config,
        })
    }

    /// Open with default tuning at the given path.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let config = RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        };
        Self::open(config)
    }

    fn make_key(collection: &str, id: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(collection.len() + 1 + id.len());
        key.extend_from_slice(collection.as_bytes());
        key.push(b'/');
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn encode(version: u64, data: &[u8]) -> Vec<u8> {
        let mut value = Vec::with_capacity(8 + data.len());
        value.extend_from_slice(&version.to_be_bytes());
        value.extend_from_slice(data);
        value
    }

    fn decode(value: &[u8]) -> Result<VersionedDoc, StoreError> {
        if value.len() < 8 {
            return Err(StoreError::Backend(
                "corrupt document: missing version prefix".to_string(),
            ));
        }
        let mut version_bytes = [0u8; 8];
        version_bytes.copy_from_slice(&value[..8]);
        Ok(VersionedDoc {
            version: u64::from_be_bytes(version_bytes),
            data: value[8..].to_vec(),
        })
    }
}

impl DocumentStore for RocksDbStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<VersionedDoc>, StoreError> {
        let db = self.db.read();
        let key = Self::make_key(collection, id);
        match db.get(&key) {
            Ok(Some(value)) => Self::decode(&value).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Backend(format!("RocksDB get failed: {e}"))),
        }
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, VersionedDoc)>, StoreError> {
        let db = self.db.read();
        let prefix = format!("{collection}/");
        let mut results = Vec::new();

        let iter = db.iterator(IteratorMode::From(
            prefix.as_bytes(),
            rocksdb::Direction::Forward,
        ));
        for item in iter {
            let (key, value) =
                item.map_err(|e| StoreError::Backend(format!("RocksDB scan failed: {e}")))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let id = String::from_utf8_lossy(&key[prefix.len()..]).to_string();
            results.push((id, Self::decode(&value)?));
        }
        Ok(results)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        // Write lock for the whole validate-then-write sequence; RocksDB's
        // own batch gives atomicity, the lock gives isolation.
        let db = self.db.write();

        for op in batch.ops() {
            let key = Self::make_key(op.collection(), op.id());
            let existing = db
                .get(&key)
                .map_err(|e| StoreError::Backend(format!("RocksDB get failed: {e}")))?;
            match (op, existing) {
                (WriteOp::Insert { .. }, Some(_)) => {
                    return Err(StoreError::VersionConflict {
                        collection: op.collection().to_string(),
                        id: op.id().to_string(),
                    });
                }
                (WriteOp::Update { .. }, None) => {
                    return Err(StoreError::NotFound {
                        collection: op.collection().to_string(),
                        id: op.id().to_string(),
                    });
                }
                (
                    WriteOp::Update {
                        expected_version, ..
                    },
                    Some(value),
                ) => {
                    let doc = Self::decode(&value)?;
                    if doc.version != *expected_version {
                        return Err(StoreError::VersionConflict {
                            collection: op.collection().to_string(),
                            id: op.id().to_string(),
                        });
                    }
                }
                _ => {}
            }
        }

        let mut rocks_batch = RocksBatch::default();
        for op in batch.into_ops() {
            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    data,
                } => {
                    rocks_batch.put(Self::make_key(collection, &id), Self::encode(1, &data));
                }
                WriteOp::Update {
                    collection,
                    id,
                    expected_version,
                    data,
                } => {
                    rocks_batch.put(
                        Self::make_key(collection, &id),
                        Self::encode(expected_version + 1, &data),
                    );
                }
            }
        }

        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        db.write_opt(rocks_batch, &write_opts)
            .map_err(|e| StoreError::Backend(format!("RocksDB batch write failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, RocksDbStore) {
        let dir = TempDir::new().unwrap();
        let config = RocksDbConfig::for_testing(dir.path().to_string_lossy().to_string());
        let store = RocksDbStore::open(config).unwrap();
        (dir, store)
    }

    #[test]
    fn insert_get_update_round_trip() {
        let (_dir, store) = open_temp();

        let mut batch = WriteBatch::new();
        batch.insert("wallets", "user:1", b"{\"balance\":0}".to_vec());
        store.commit(batch).unwrap();

        let doc = store.get("wallets", "user:1").unwrap().unwrap();
        assert_eq!(doc.version, 1);

        let mut batch = WriteBatch::new();
        batch.update("wallets", "user:1", 1, b"{\"balance\":5}".to_vec());
        store.commit(batch).unwrap();

        let doc = store.get("wallets", "user:1").unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.data, b"{\"balance\":5}");
    }

    #[test]
    fn stale_update_rejected() {
        let (_dir, store) = open_temp();

        let mut batch = WriteBatch::new();
        batch.insert("wallets", "w1", b"a".to_vec());
        store.commit(batch).unwrap();

        let mut batch = WriteBatch::new();
        batch.update("wallets", "w1", 7, b"b".to_vec());
        assert!(matches!(
            store.commit(batch),
            Err(StoreError::VersionConflict { .. })
        ));
    }

    #[test]
    fn list_scans_only_the_collection() {
        let (_dir, store) = open_temp();

        let mut batch = WriteBatch::new();
        batch.insert("pets", "p1", b"a".to_vec());
        batch.insert("pets", "p2", b"b".to_vec());
        batch.insert("wallets", "w1", b"c".to_vec());
        store.commit(batch).unwrap();

        let pets = store.list("pets").unwrap();
        assert_eq!(pets.len(), 2);
    }
}
