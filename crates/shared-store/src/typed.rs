//! Typed collection wrapper.
//!
//! Services work with `TypedCollection<T>` rather than raw bytes: it owns
//! the collection name and the serde round trip, and hands back
//! [`Versioned<T>`] values whose version feeds the next update.

use crate::error::StoreError;
use crate::port::{DocumentStore, WriteBatch, WriteOp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// A deserialized document together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: u64,
    pub doc: T,
}

/// A named collection of documents of one type.
pub struct TypedCollection<T> {
    store: Arc<dyn DocumentStore>,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> TypedCollection<T> {
    pub fn new(store: Arc<dyn DocumentStore>, name: &'static str) -> Self {
        Self {
            store,
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, id: &str) -> Result<Option<Versioned<T>>, StoreError> {
        match self.store.get(self.name, id)? {
            Some(doc) => {
                let value = serde_json::from_slice(&doc.data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(Versioned {
                    version: doc.version,
                    doc: value,
                }))
            }
            None => Ok(None),
        }
    }

    /// Like [`TypedCollection::get`] but a missing document is an error.
    pub fn require(&self, id: &str) -> Result<Versioned<T>, StoreError> {
        self.get(id)?.ok_or_else(|| StoreError::NotFound {
            collection: self.name.to_string(),
            id: id.to_string(),
        })
    }

    pub fn list(&self) -> Result<Vec<(String, Versioned<T>)>, StoreError> {
        self.store
            .list(self.name)?
            .into_iter()
            .map(|(id, doc)| {
                let value = serde_json::from_slice(&doc.data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok((
                    id,
                    Versioned {
                        version: doc.version,
                        doc: value,
                    },
                ))
            })
            .collect()
    }

    /// Build an insert op for a larger batch.
    pub fn insert_op(&self, id: impl Into<String>, value: &T) -> Result<WriteOp, StoreError> {
        Ok(WriteOp::Insert {
            collection: self.name,
            id: id.into(),
            data: self.encode(value)?,
        })
    }

    /// Build a version-guarded update op for a larger batch.
    pub fn update_op(
        &self,
        id: impl Into<String>,
        expected_version: u64,
        value: &T,
    ) -> Result<WriteOp, StoreError> {
        Ok(WriteOp::Update {
            collection: self.name,
            id: id.into(),
            expected_version,
            data: self.encode(value)?,
        })
    }

    /// Single-document insert.
    pub fn insert(&self, id: impl Into<String>, value: &T) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.push(self.insert_op(id, value)?);
        self.store.commit(batch)
    }

    /// Single-document version-guarded update.
    pub fn update(
        &self,
        id: impl Into<String>,
        expected_version: u64,
        value: &T,
    ) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.push(self.update_op(id, expected_version, value)?);
        self.store.commit(batch)
    }

    /// Commit a batch built from this or several collections.
    pub fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.store.commit(batch)
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    fn collection() -> TypedCollection<Doc> {
        TypedCollection::new(Arc::new(MemoryStore::new()), "docs")
    }

    #[test]
    fn typed_round_trip() {
        let docs = collection();
        let value = Doc {
            name: "whiskers".to_string(),
            count: 1,
        };
        docs.insert("d1", &value).unwrap();

        let loaded = docs.get("d1").unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.doc, value);
    }

    #[test]
    fn require_missing_is_not_found() {
        let docs = collection();
        assert!(matches!(
            docs.require("ghost"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn update_uses_read_version() {
        let docs = collection();
        docs.insert("d1", &Doc {
            name: "a".to_string(),
            count: 0,
        })
        .unwrap();

        let loaded = docs.get("d1").unwrap().unwrap();
        let mut doc = loaded.doc;
        doc.count += 1;
        docs.update("d1", loaded.version, &doc).unwrap();

        let reloaded = docs.get("d1").unwrap().unwrap();
        assert_eq!(reloaded.version, 2);
        assert_eq!(reloaded.doc.count, 1);

        // A second writer holding the old version loses.
        assert!(matches!(
            docs.update("d1", loaded.version, &doc),
            Err(StoreError::VersionConflict { .. })
        ));
    }

    #[test]
    fn cross_collection_batch_is_atomic() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let left: TypedCollection<Doc> = TypedCollection::new(Arc::clone(&store), "left");
        let right: TypedCollection<Doc> = TypedCollection::new(Arc::clone(&store), "right");

        let doc = Doc {
            name: "x".to_string(),
            count: 0,
        };
        left.insert("a", &doc).unwrap();

        let mut batch = WriteBatch::new();
        batch.push(right.insert_op("b", &doc).unwrap());
        // Stale version makes the whole batch fail.
        batch.push(left.update_op("a", 99, &doc).unwrap());
        assert!(left.commit(batch).is_err());
        assert!(right.get("b").unwrap().is_none());
    }
}
