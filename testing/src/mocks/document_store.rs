//! In-memory live document store.

use async_stream::stream;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use synclist_core::document::{
    CollectionId, Document, DocumentId, DocumentStore, DocumentStoreError, Fields, Snapshot,
    SnapshotStream,
};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// A call made against [`InMemoryDocumentStore`], recorded in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// `subscribe(collection)`
    Subscribe(CollectionId),
    /// `create(collection, fields)`
    Create {
        /// Target collection
        collection: CollectionId,
        /// Fields written
        fields: Fields,
    },
    /// `update(collection, document, field, value)`
    Update {
        /// Target collection
        collection: CollectionId,
        /// Updated document
        document: DocumentId,
        /// Field name
        field: String,
        /// New value
        value: Value,
    },
    /// `delete(collection, document)`
    Delete {
        /// Target collection
        collection: CollectionId,
        /// Deleted document
        document: DocumentId,
    },
}

impl Operation {
    /// Returns `true` for create, update and delete.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::Subscribe(_))
    }
}

#[derive(Clone, Debug)]
enum Change {
    Snapshot(CollectionId, Snapshot),
    Error(CollectionId, DocumentStoreError),
}

#[derive(Debug, Default)]
struct Collections {
    documents: HashMap<CollectionId, Vec<Document>>,
    operations: Vec<Operation>,
    write_failure: Option<DocumentStoreError>,
    subscribe_failure: Option<DocumentStoreError>,
}

impl Collections {
    fn snapshot(&self, collection: &CollectionId) -> Snapshot {
        Snapshot::new(self.documents.get(collection).cloned().unwrap_or_default())
    }
}

/// In-memory document store with live snapshots.
///
/// Collections keep documents in insertion order. Every successful write
/// pushes a fresh snapshot of the touched collection to its subscribers; a new
/// subscriber first receives the collection's current contents. Failures can
/// be injected for writes and subscriptions, and errors can be pushed into
/// open subscriptions with [`push_error`](Self::push_error).
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use synclist_core::document::{CollectionId, DocumentStore, Fields};
/// use synclist_core::identity::PrincipalId;
/// use synclist_testing::mocks::InMemoryDocumentStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryDocumentStore::new();
/// let collection = CollectionId::for_principal(&PrincipalId::new("uid-1"));
///
/// let mut snapshots = store.subscribe(collection.clone()).await?;
/// assert!(snapshots.next().await.ok_or("closed")??.is_empty());
///
/// store.create(collection, Fields::new()).await?;
/// assert_eq!(snapshots.next().await.ok_or("closed")??.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<Mutex<Collections>>,
    changes: broadcast::Sender<Change>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            collections: Arc::new(Mutex::new(Collections::default())),
            changes,
        }
    }

    /// Insert a document directly, bypassing failure injection and the
    /// operation log.
    pub fn insert(&self, collection: &CollectionId, fields: Fields) -> DocumentId {
        let mut collections = self.lock();
        self.append(&mut collections, collection, fields)
    }

    /// Current documents of `collection`, in store order.
    #[must_use]
    pub fn documents(&self, collection: &CollectionId) -> Vec<Document> {
        self.lock().snapshot(collection).documents
    }

    /// Every call made so far, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Number of create, update and delete calls made so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock()
            .operations
            .iter()
            .filter(|op| op.is_write())
            .count()
    }

    /// Reject every following write with `error`.
    pub fn fail_writes(&self, error: DocumentStoreError) {
        self.lock().write_failure = Some(error);
    }

    /// Reject every following subscription with `error`.
    pub fn fail_subscriptions(&self, error: DocumentStoreError) {
        self.lock().subscribe_failure = Some(error);
    }

    /// Clear injected failures.
    pub fn recover(&self) {
        let mut collections = self.lock();
        collections.write_failure = None;
        collections.subscribe_failure = None;
    }

    /// Deliver `error` to every open subscription on `collection`.
    pub fn push_error(&self, collection: &CollectionId, error: DocumentStoreError) {
        let _guard = self.lock();
        let _ = self.changes.send(Change::Error(collection.clone(), error));
    }

    /// Number of open subscriptions across all collections.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(
        &self,
        collections: &mut Collections,
        collection: &CollectionId,
        fields: Fields,
    ) -> DocumentId {
        let id = DocumentId::new(uuid::Uuid::new_v4().simple().to_string());
        collections
            .documents
            .entry(collection.clone())
            .or_default()
            .push(Document::new(id.clone(), fields));
        self.publish(collections, collection);
        id
    }

    /// Broadcast while the lock is held, so subscribers see writes in order.
    fn publish(&self, collections: &Collections, collection: &CollectionId) {
        let snapshot = collections.snapshot(collection);
        let _ = self
            .changes
            .send(Change::Snapshot(collection.clone(), snapshot));
    }

    fn check_write(collections: &Collections) -> Result<(), DocumentStoreError> {
        match &collections.write_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn write<T>(
        &self,
        operation: Operation,
        apply: impl FnOnce(&Self, &mut Collections) -> Result<T, DocumentStoreError>,
    ) -> Result<T, DocumentStoreError> {
        let mut collections = self.lock();
        collections.operations.push(operation);
        Self::check_write(&collections)?;
        apply(self, &mut *collections)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn subscribe(
        &self,
        collection: CollectionId,
    ) -> Pin<Box<dyn Future<Output = Result<SnapshotStream, DocumentStoreError>> + Send + '_>>
    {
        let opened = {
            let mut collections = self.lock();
            collections
                .operations
                .push(Operation::Subscribe(collection.clone()));

            match &collections.subscribe_failure {
                Some(error) => Err(error.clone()),
                // Taken under the lock: no write can slip between the initial
                // snapshot and the first broadcast this receiver sees.
                None => Ok((collections.snapshot(&collection), self.changes.subscribe())),
            }
        };

        let shared = Arc::clone(&self.collections);
        Box::pin(async move {
            let (initial, mut changes) = opened?;

            let snapshots: SnapshotStream = Box::pin(stream! {
                yield Ok(initial);
                loop {
                    match changes.recv().await {
                        Ok(Change::Snapshot(target, snapshot)) if target == collection => {
                            yield Ok(snapshot);
                        },
                        Ok(Change::Error(target, error)) if target == collection => {
                            yield Err(error);
                        },
                        Ok(_) => {},
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Subscriber lagged, resending latest snapshot");
                            let latest = shared
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .snapshot(&collection);
                            yield Ok(latest);
                        },
                        Err(RecvError::Closed) => break,
                    }
                }
            });
            Ok(snapshots)
        })
    }

    fn create(
        &self,
        collection: CollectionId,
        fields: Fields,
    ) -> Pin<Box<dyn Future<Output = Result<DocumentId, DocumentStoreError>> + Send + '_>> {
        let operation = Operation::Create {
            collection: collection.clone(),
            fields: fields.clone(),
        };
        let result = self.write(operation, |store, collections| {
            Ok(store.append(collections, &collection, fields))
        });
        Box::pin(async move { result })
    }

    fn update(
        &self,
        collection: CollectionId,
        document: DocumentId,
        field: String,
        value: Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>> {
        let operation = Operation::Update {
            collection: collection.clone(),
            document: document.clone(),
            field: field.clone(),
            value: value.clone(),
        };
        let result = self.write(operation, |store, collections| {
            let target = collections
                .documents
                .get_mut(&collection)
                .and_then(|docs| docs.iter_mut().find(|doc| doc.id == document))
                .ok_or_else(|| DocumentStoreError::NotFound {
                    collection: collection.clone(),
                    document: document.clone(),
                })?;
            target.fields.insert(field, value);
            store.publish(collections, &collection);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn delete(
        &self,
        collection: CollectionId,
        document: DocumentId,
    ) -> Pin<Box<dyn Future<Output = Result<(), DocumentStoreError>> + Send + '_>> {
        let operation = Operation::Delete {
            collection: collection.clone(),
            document: document.clone(),
        };
        let result = self.write(operation, |store, collections| {
            let Some(docs) = collections.documents.get_mut(&collection) else {
                return Ok(());
            };
            let before = docs.len();
            docs.retain(|doc| doc.id != document);
            // Deleting a missing document succeeds without notifying anyone.
            if docs.len() != before {
                store.publish(collections, &collection);
            }
            Ok(())
        });
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use synclist_core::identity::PrincipalId;

    fn collection(id: &str) -> CollectionId {
        CollectionId::for_principal(&PrincipalId::new(id))
    }

    fn text(value: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("text".into(), Value::from(value));
        fields
    }

    async fn next(stream: &mut SnapshotStream) -> Result<Snapshot, DocumentStoreError> {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timed out waiting for snapshot")
            .expect("stream ended")
    }

    #[tokio::test]
    async fn subscriber_sees_current_contents_then_every_write() {
        let store = InMemoryDocumentStore::new();
        let c = collection("u1");
        store.insert(&c, text("first"));

        let mut snapshots = store.subscribe(c.clone()).await.unwrap();
        assert_eq!(next(&mut snapshots).await.unwrap().len(), 1);

        let id = store.create(c.clone(), text("second")).await.unwrap();
        let snapshot = next(&mut snapshots).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.documents[1].id, id);

        store.delete(c.clone(), id).await.unwrap();
        assert_eq!(next(&mut snapshots).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = InMemoryDocumentStore::new();
        let mine = collection("u1");
        let theirs = collection("u2");

        let mut snapshots = store.subscribe(mine.clone()).await.unwrap();
        let _ = next(&mut snapshots).await.unwrap();

        store.create(theirs.clone(), text("secret")).await.unwrap();
        store.create(mine.clone(), text("mine")).await.unwrap();

        let snapshot = next(&mut snapshots).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.documents[0].get_str("text"), Some("mine"));
        assert_eq!(store.documents(&theirs).len(), 1);
    }

    #[tokio::test]
    async fn update_sets_one_field() {
        let store = InMemoryDocumentStore::new();
        let c = collection("u1");
        let id = store.insert(&c, text("milk"));

        store
            .update(c.clone(), id, "isDone".into(), Value::Bool(true))
            .await
            .unwrap();

        let doc = &store.documents(&c)[0];
        assert_eq!(doc.get_str("text"), Some("milk"));
        assert_eq!(doc.get_bool("isDone"), Some(true));
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let result = store
            .update(collection("u1"), DocumentId::new("nope"), "isDone".into(), Value::Bool(true))
            .await;
        assert!(matches!(result, Err(DocumentStoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn injected_write_failure_leaves_data_untouched() {
        let store = InMemoryDocumentStore::new();
        let c = collection("u1");
        store.fail_writes(DocumentStoreError::Unavailable("offline".into()));

        let result = store.create(c.clone(), text("milk")).await;

        assert_eq!(result, Err(DocumentStoreError::Unavailable("offline".into())));
        assert!(store.documents(&c).is_empty());
        assert_eq!(store.write_count(), 1);

        store.recover();
        assert!(store.create(c.clone(), text("milk")).await.is_ok());
    }

    #[tokio::test]
    async fn injected_subscription_failure() {
        let store = InMemoryDocumentStore::new();
        store.fail_subscriptions(DocumentStoreError::PermissionDenied(collection("u1")));

        assert!(store.subscribe(collection("u1")).await.is_err());
        assert_eq!(store.operations(), vec![Operation::Subscribe(collection("u1"))]);
    }

    #[tokio::test]
    async fn pushed_error_reaches_open_subscription() {
        let store = InMemoryDocumentStore::new();
        let c = collection("u1");
        let mut snapshots = store.subscribe(c.clone()).await.unwrap();
        let _ = next(&mut snapshots).await.unwrap();

        store.push_error(&c, DocumentStoreError::Internal("boom".into()));

        assert_eq!(
            next(&mut snapshots).await,
            Err(DocumentStoreError::Internal("boom".into()))
        );
    }

    #[tokio::test]
    async fn dropping_the_stream_unsubscribes() {
        let store = InMemoryDocumentStore::new();
        let snapshots = store.subscribe(collection("u1")).await.unwrap();
        assert_eq!(store.subscriber_count(), 1);

        drop(snapshots);
        assert_eq!(store.subscriber_count(), 0);
    }
}
