//! Store error types.

use thiserror::Error;

/// Errors from the document store port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The document changed (or appeared) since it was read. The caller
    /// should re-read and retry the whole operation.
    #[error("version conflict on {collection}/{id}")]
    VersionConflict { collection: String, id: String },

    /// An update named a document that does not exist.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A document failed to serialize or deserialize.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The backing engine failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}
