//! Live document store abstraction.
//!
//! The document store is a hosted database that groups documents into
//! collections and pushes a complete snapshot of a collection every time it
//! changes. Synclist keeps one collection per principal; a [`CollectionId`]
//! can only be derived from a [`PrincipalId`], so no call can address another
//! user's data.
//!
//! # Example
//!
//! ```
//! use synclist_core::document::{CollectionId, Document, DocumentId, Fields};
//! use synclist_core::identity::PrincipalId;
//!
//! let collection = CollectionId::for_principal(&PrincipalId::new("uid-7"));
//! assert_eq!(collection.as_str(), "uid-7");
//!
//! let mut fields = Fields::new();
//! fields.insert("isDone".into(), true.into());
//! let doc = Document::new(DocumentId::new("a1"), fields);
//! assert_eq!(doc.get_bool("isDone"), Some(true));
//! assert_eq!(doc.get_str("text"), None);
//! ```

use crate::identity::PrincipalId;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// Name of a per-user collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionId(String);

impl CollectionId {
    /// The collection owned by `principal`.
    #[must_use]
    pub fn for_principal(principal: &PrincipalId) -> Self {
        Self(principal.as_str().to_string())
    }

    /// Get the collection name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque document identifier assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a store-issued id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the document ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A stored document: its id and its fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned id
    pub id: DocumentId,
    /// Field values
    pub fields: Fields,
}

impl Document {
    /// Create a document
    #[must_use]
    pub const fn new(id: DocumentId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// A string field, or `None` if missing or not a string
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// A boolean field, or `None` if missing or not a boolean
    #[must_use]
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(Value::as_bool)
    }
}

/// Complete, ordered, point-in-time contents of a collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Documents in store order
    pub documents: Vec<Document>,
}

impl Snapshot {
    /// Create a snapshot from documents in store order
    #[must_use]
    pub const fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Number of documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the collection is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl IntoIterator for Snapshot {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

/// Errors reported by the document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentStoreError {
    /// The store's access rules rejected the request.
    #[error("Permission denied on collection {0}")]
    PermissionDenied(CollectionId),

    /// The document does not exist.
    #[error("Document {document} not found in collection {collection}")]
    NotFound {
        /// Collection searched
        collection: CollectionId,
        /// Missing document
        document: DocumentId,
    },

    /// The store could not be reached.
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// Any other store-side failure.
    #[error("Document store error: {0}")]
    Internal(String),
}

/// Live stream of snapshots (or errors) for one collection.
///
/// May yield zero or many items; ends only when the store drops the listener.
pub type SnapshotStream =
    Pin<Box<dyn Stream<Item = Result<Snapshot, DocumentStoreError>> + Send>>;

/// Realtime document store abstraction.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be held as `Arc<dyn DocumentStore>` and captured by effects.
pub trait DocumentStore: Send + Sync {
    /// Open a live subscription on `collection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be attached.
    fn subscribe(
        &self,
        collection: CollectionId,
    ) -> Pin<Box<dyn Future<Output = Result<SnapshotStream, DocumentStoreError>> + Send + '_>>;

    /// Create a document with store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected.
    fn create(
        &self,
        collection: CollectionId,
        fields: Fields,
    ) -> Pin<Box<dyn Future<Output = Result<DocumentId, DocumentStoreError>> + Send + '_>>;

    /// Set one field of an existing document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing or the write is rejected.
    fn update(
        &self,
        collection: CollectionId,
        document: DocumentId,
        field: String,
        value: Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>>;

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected.
    fn delete(
        &self,
        collection: CollectionId,
        document: DocumentId,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>>;
}
