//! In-memory implementation of the document store.

use crate::error::StoreError;
use crate::port::{DocumentStore, VersionedDoc, WriteBatch, WriteOp};
use parking_lot::RwLock;
use std::collections::HashMap;

type CollectionMap = HashMap<String, HashMap<String, VersionedDoc>>;

/// In-memory document store, the default backend and the test workhorse.
///
/// A single lock over all collections keeps batch commits trivially atomic;
/// contention is irrelevant at the scales this adapter serves.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<CollectionMap>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection (test helper).
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, HashMap::len)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<VersionedDoc>, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, VersionedDoc)>, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut collections = self.collections.write();

        // Validate every op before touching anything.
        for op in batch.ops() {
            let existing = collections
                .get(op.collection())
                .and_then(|docs| docs.get(op.id()));
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
                    Some(doc),
                ) if doc.version != *expected_version => {
                    return Err(StoreError::VersionConflict {
                        collection: op.collection().to_string(),
                        id: op.id().to_string(),
                    });
                }
                _ => {}
            }
        }

        // All checks passed; apply under the same lock hold.
        for op in batch.into_ops() {
            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    data,
                } => {
                    collections
                        .entry(collection.to_string())
                        .or_default()
                        .insert(id, VersionedDoc { version: 1, data });
                }
                WriteOp::Update {
                    collection,
                    id,
                    expected_version,
                    data,
                } => {
                    collections.entry(collection.to_string()).or_default().insert(
                        id,
                        VersionedDoc {
                            version: expected_version + 1,
                            data,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}
