//! The document store port.

use crate::error::StoreError;

/// A stored document: raw JSON bytes plus the version counter.
///
/// Versions start at 1 on insert and increment on every successful update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedDoc {
    pub version: u64,
    pub data: Vec<u8>,
}

/// One write in a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create a document. Fails the batch with `VersionConflict` if the id
    /// already exists (a concurrent creator won the race).
    Insert {
        collection: &'static str,
        id: String,
        data: Vec<u8>,
    },
    /// Replace a document, guarded by the version the writer read.
    Update {
        collection: &'static str,
        id: String,
        expected_version: u64,
        data: Vec<u8>,
    },
}

impl WriteOp {
    pub(crate) fn collection(&self) -> &'static str {
        match self {
            Self::Insert { collection, .. } | Self::Update { collection, .. } => collection,
        }
    }

    pub(crate) fn id(&self) -> &str {
        match self {
            Self::Insert { id, .. } | Self::Update { id, .. } => id,
        }
    }
}

/// An all-or-nothing set of writes across collections.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: &'static str, id: impl Into<String>, data: Vec<u8>) {
        self.ops.push(WriteOp::Insert {
            collection,
            id: id.into(),
            data,
        });
    }

    pub fn update(
        &mut self,
        collection: &'static str,
        id: impl Into<String>,
        expected_version: u64,
        data: Vec<u8>,
    ) {
        self.ops.push(WriteOp::Update {
            collection,
            id: id.into(),
            expected_version,
            data,
        });
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub(crate) fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Versioned document storage.
///
/// The port is synchronous: both adapters are embedded engines whose
/// operations complete without yielding, and async callers simply call
/// through. Implementations must make [`DocumentStore::commit`] atomic —
/// either every op in the batch applies or none does.
pub trait DocumentStore: Send + Sync {
    /// Fetch one document.
    fn get(&self, collection: &str, id: &str) -> Result<Option<VersionedDoc>, StoreError>;

    /// All documents in a collection, in unspecified order.
    fn list(&self, collection: &str) -> Result<Vec<(String, VersionedDoc)>, StoreError>;

    /// Apply a batch atomically with version checks.
    ///
    /// Any version mismatch or insert-over-existing fails the whole batch
    /// with `VersionConflict`; an update of a missing document fails with
    /// `NotFound`.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
