//! Sync view-model: the live, per-user item list.
//!
//! The list is a cached projection of the user's collection. It is only ever
//! replaced wholesale by snapshots from a single subscription; item
//! operations are fire-and-forget writes whose results show up through the
//! next snapshot.
//!
//! Writes always target the collection of the principal whose list is shown,
//! and only while the identity provider still reports that same principal.

use crate::types::{IS_DONE_FIELD, Item, ItemRef};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use synclist_core::document::{CollectionId, DocumentStore, DocumentStoreError, Snapshot};
use synclist_core::identity::{AuthProvider, PrincipalId};
use synclist_core::{Effect, EffectId, Reducer, SmallVec, smallvec};

/// Id of the snapshot subscription stream.
pub const SNAPSHOT_SUBSCRIPTION: EffectId = EffectId::new("sync.snapshots");

/// State of the sync view-model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Principal whose collection the list mirrors
    pub principal: Option<PrincipalId>,
    /// Items in store order
    pub items: Arc<[ItemRef]>,
    /// Bumped on every wholesale replacement
    pub revision: u64,
}

impl SyncState {
    fn replace(&mut self, items: Arc<[ItemRef]>) {
        self.items = items;
        self.revision += 1;
    }
}

/// Inputs of the sync view-model.
#[derive(Clone, Debug)]
pub enum SyncAction {
    /// Open (or reopen) the live subscription for `principal`
    Subscribe(PrincipalId),
    /// Create an item
    Add(Item),
    /// Delete an item
    Delete(ItemRef),
    /// Flip an item's completion flag
    Toggle(ItemRef),
    /// A snapshot arrived on the subscription opened for `principal`
    SnapshotReceived {
        /// Owner of the subscription that produced it
        principal: PrincipalId,
        /// Complete collection contents
        snapshot: Snapshot,
    },
    /// The subscription opened for `principal` reported an error
    SubscriptionFailed {
        /// Owner of the failing subscription
        principal: PrincipalId,
        /// Store error
        error: DocumentStoreError,
    },
    /// Drop the subscription and forget the projected items
    Reset,
}

/// Collaborators of the sync view-model.
#[derive(Clone)]
pub struct SyncEnvironment {
    /// Identity provider, read for the current session
    pub auth: Arc<dyn AuthProvider>,
    /// Live document store
    pub documents: Arc<dyn DocumentStore>,
}

impl SyncEnvironment {
    /// Creates a new `SyncEnvironment`
    #[must_use]
    pub fn new(auth: Arc<dyn AuthProvider>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { auth, documents }
    }

    /// `true` if the identity provider currently reports `principal`.
    fn is_signed_in_as(&self, principal: &PrincipalId) -> bool {
        self.auth
            .current_session()
            .is_some_and(|session| session.principal == *principal)
    }

    /// Collection of the principal whose list is shown, if that principal is
    /// still the signed-in one.
    fn write_target(&self, state: &SyncState) -> Option<CollectionId> {
        state
            .principal
            .as_ref()
            .filter(|principal| self.is_signed_in_as(principal))
            .map(CollectionId::for_principal)
    }
}

/// Reducer for the sync view-model
#[derive(Clone, Debug, Default)]
pub struct SyncReducer;

impl SyncReducer {
    /// Creates a new `SyncReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn subscribe(
        state: &mut SyncState,
        principal: PrincipalId,
        env: &SyncEnvironment,
    ) -> SmallVec<[Effect<SyncAction>; 4]> {
        if !env.is_signed_in_as(&principal) {
            tracing::debug!(%principal, "Not signed in as this principal, not subscribing");
            return SmallVec::new();
        }

        if state.principal.as_ref() != Some(&principal) {
            tracing::debug!(%principal, "Subscribing as a new principal, clearing list");
            state.principal = Some(principal.clone());
            state.replace(Arc::default());
        }

        let documents = Arc::clone(&env.documents);
        let collection = CollectionId::for_principal(&principal);
        let snapshots = async_stream::stream! {
            match documents.subscribe(collection).await {
                Ok(mut stream) => {
                    while let Some(next) = stream.next().await {
                        yield match next {
                            Ok(snapshot) => SyncAction::SnapshotReceived {
                                principal: principal.clone(),
                                snapshot,
                            },
                            Err(error) => SyncAction::SubscriptionFailed {
                                principal: principal.clone(),
                                error,
                            },
                        };
                    }
                },
                Err(error) => yield SyncAction::SubscriptionFailed { principal, error },
            }
        };

        smallvec![Effect::stream(SNAPSHOT_SUBSCRIPTION, snapshots)]
    }

    /// Wraps a write as a fire-and-forget effect; failures are only logged.
    fn write<F>(operation: &'static str, write: F) -> Effect<SyncAction>
    where
        F: std::future::Future<Output = Result<(), DocumentStoreError>> + Send + 'static,
    {
        Effect::future(async move {
            if let Err(error) = write.await {
                tracing::warn!(operation, %error, "Write rejected by document store");
                metrics::counter!("sync.writes.failed", "operation" => operation).increment(1);
            }
            None
        })
    }

    fn skipped(operation: &'static str) -> SmallVec<[Effect<SyncAction>; 4]> {
        tracing::debug!(operation, "No matching session, skipping write");
        metrics::counter!("sync.writes.skipped", "operation" => operation).increment(1);
        SmallVec::new()
    }
}

impl Reducer for SyncReducer {
    type State = SyncState;
    type Action = SyncAction;
    type Environment = SyncEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            SyncAction::Subscribe(principal) => Self::subscribe(state, principal, env),

            SyncAction::Add(item) => {
                let Some(collection) = env.write_target(state) else {
                    return Self::skipped("add");
                };
                let documents = Arc::clone(&env.documents);
                smallvec![Self::write("add", async move {
                    let id = documents.create(collection, item.to_fields()).await?;
                    tracing::debug!(%id, "Item created");
                    Ok::<(), DocumentStoreError>(())
                })]
            },

            SyncAction::Delete(item_ref) => {
                let Some(collection) = env.write_target(state) else {
                    return Self::skipped("delete");
                };
                let documents = Arc::clone(&env.documents);
                smallvec![Self::write("delete", async move {
                    documents.delete(collection, item_ref.id).await
                })]
            },

            SyncAction::Toggle(item_ref) => {
                let Some(collection) = env.write_target(state) else {
                    return Self::skipped("toggle");
                };
                let documents = Arc::clone(&env.documents);
                let is_done = !item_ref.item.is_done;
                smallvec![Self::write("toggle", async move {
                    documents
                        .update(
                            collection,
                            item_ref.id,
                            IS_DONE_FIELD.to_string(),
                            Value::Bool(is_done),
                        )
                        .await
                })]
            },

            SyncAction::SnapshotReceived {
                principal,
                snapshot,
            } => {
                if state.principal.as_ref() != Some(&principal) {
                    tracing::debug!(%principal, "Discarding snapshot from a previous session");
                    metrics::counter!("sync.snapshots.discarded").increment(1);
                    return SmallVec::new();
                }
                tracing::debug!(%principal, documents = snapshot.len(), "Snapshot received");
                metrics::counter!("sync.snapshots.received").increment(1);
                state.replace(snapshot.documents.iter().map(ItemRef::from).collect());
                SmallVec::new()
            },

            SyncAction::SubscriptionFailed { principal, error } => {
                tracing::warn!(%principal, %error, "Subscription error, keeping current list");
                metrics::counter!("sync.subscription.errors").increment(1);
                SmallVec::new()
            },

            SyncAction::Reset => {
                state.principal = None;
                if !state.items.is_empty() {
                    state.replace(Arc::default());
                }
                smallvec![Effect::Cancel(SNAPSHOT_SUBSCRIPTION)]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synclist_core::document::{Document, DocumentId, Fields};
    use synclist_core::identity::Session;
    use synclist_testing::mocks::{InMemoryDocumentStore, MockAuthProvider, Operation};
    use synclist_testing::{ReducerTest, assertions};

    fn env(auth: &MockAuthProvider, documents: &InMemoryDocumentStore) -> SyncEnvironment {
        SyncEnvironment::new(Arc::new(auth.clone()), Arc::new(documents.clone()))
    }

    fn signed_in(id: &str) -> MockAuthProvider {
        MockAuthProvider::new().with_session(Session::new(PrincipalId::new(id)))
    }

    fn snapshot(texts: &[&str]) -> Snapshot {
        Snapshot::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    Document::new(DocumentId::new(format!("d{i}")), Item::new(*text).to_fields())
                })
                .collect(),
        )
    }

    fn state_for(principal: &str, texts: &[&str]) -> SyncState {
        let mut state = SyncState {
            principal: Some(PrincipalId::new(principal)),
            ..SyncState::default()
        };
        state.replace(snapshot(texts).documents.iter().map(ItemRef::from).collect());
        state
    }

    async fn run_effects(effects: SmallVec<[Effect<SyncAction>; 4]>) {
        for effect in effects {
            if let Effect::Future(fut) = effect {
                assert!(fut.await.is_none());
            }
        }
    }

    #[test]
    fn subscribe_without_session_does_nothing() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&MockAuthProvider::new(), &documents))
            .given_state(SyncState::default())
            .when_action(SyncAction::Subscribe(PrincipalId::new("u1")))
            .then_state(|state| assert_eq!(*state, SyncState::default()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn subscribe_starts_the_snapshot_stream() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u1"), &documents))
            .given_state(SyncState::default())
            .when_action(SyncAction::Subscribe(PrincipalId::new("u1")))
            .then_state(|state| {
                assert_eq!(state.principal, Some(PrincipalId::new("u1")));
                assert!(state.items.is_empty());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_stream_effect(effects, SNAPSHOT_SUBSCRIPTION);
            })
            .run();
    }

    #[test]
    fn subscribing_as_another_principal_clears_the_list() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u2"), &documents))
            .given_state(state_for("u1", &["secret"]))
            .when_action(SyncAction::Subscribe(PrincipalId::new("u2")))
            .then_state(|state| {
                assert_eq!(state.principal, Some(PrincipalId::new("u2")));
                assert!(state.items.is_empty());
                assert_eq!(state.revision, 2);
            })
            .run();
    }

    #[test]
    fn resubscribing_as_same_principal_keeps_the_list() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u1"), &documents))
            .given_state(state_for("u1", &["milk"]))
            .when_action(SyncAction::Subscribe(PrincipalId::new("u1")))
            .then_state(|state| {
                assert_eq!(state.items.len(), 1);
                assert_eq!(state.revision, 1);
            })
            .run();
    }

    #[test]
    fn subscribe_for_someone_else_does_nothing() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u2"), &documents))
            .given_state(state_for("u1", &["milk"]))
            .when_action(SyncAction::Subscribe(PrincipalId::new("u1")))
            .then_state(|state| {
                assert_eq!(state.principal, Some(PrincipalId::new("u1")));
                assert_eq!(state.revision, 1);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn snapshot_replaces_list_in_store_order() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u1"), &documents))
            .given_state(state_for("u1", &["old"]))
            .when_action(SyncAction::SnapshotReceived {
                principal: PrincipalId::new("u1"),
                snapshot: snapshot(&["b", "a", "c"]),
            })
            .then_state(|state| {
                let texts: Vec<_> = state.items.iter().map(|i| i.item.text.as_str()).collect();
                assert_eq!(texts, vec!["b", "a", "c"]);
                assert_eq!(state.revision, 2);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn empty_snapshot_still_bumps_revision() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u1"), &documents))
            .given_state(state_for("u1", &["milk"]))
            .when_action(SyncAction::SnapshotReceived {
                principal: PrincipalId::new("u1"),
                snapshot: Snapshot::default(),
            })
            .then_state(|state| {
                assert!(state.items.is_empty());
                assert_eq!(state.revision, 2);
            })
            .run();
    }

    #[test]
    fn snapshot_from_previous_principal_is_discarded() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u2"), &documents))
            .given_state(state_for("u2", &[]))
            .when_action(SyncAction::SnapshotReceived {
                principal: PrincipalId::new("u1"),
                snapshot: snapshot(&["secret"]),
            })
            .then_state(|state| {
                assert!(state.items.is_empty());
                assert_eq!(state.revision, 1);
            })
            .run();
    }

    #[test]
    fn subscription_error_keeps_list() {
        let documents = InMemoryDocumentStore::new();
        let before = state_for("u1", &["milk"]);
        let expected = before.clone();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u1"), &documents))
            .given_state(before)
            .when_action(SyncAction::SubscriptionFailed {
                principal: PrincipalId::new("u1"),
                error: DocumentStoreError::Unavailable("offline".into()),
            })
            .then_state(move |state| assert_eq!(*state, expected))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn reset_cancels_subscription_and_clears() {
        let documents = InMemoryDocumentStore::new();
        ReducerTest::new(SyncReducer::new())
            .with_env(env(&signed_in("u1"), &documents))
            .given_state(state_for("u1", &["milk"]))
            .when_action(SyncAction::Reset)
            .then_state(|state| {
                assert_eq!(state.principal, None);
                assert!(state.items.is_empty());
            })
            .then_effects(|effects| {
                assertions::assert_has_cancel_effect(effects, SNAPSHOT_SUBSCRIPTION);
            })
            .run();
    }

    #[tokio::test]
    async fn add_creates_an_open_item_in_own_collection() {
        let auth = signed_in("u1");
        let documents = InMemoryDocumentStore::new();
        let mut state = state_for("u1", &[]);

        let effects = SyncReducer.reduce(
            &mut state,
            SyncAction::Add(Item::new("Buy milk")),
            &env(&auth, &documents),
        );
        assert!(state.items.is_empty(), "no optimistic insert");
        run_effects(effects).await;

        let collection = CollectionId::for_principal(&PrincipalId::new("u1"));
        let stored = documents.documents(&collection);
        assert_eq!(stored.len(), 1);
        assert_eq!(Item::from_document(&stored[0]), Item::new("Buy milk"));
    }

    #[tokio::test]
    async fn toggle_writes_the_negated_flag() {
        let auth = signed_in("u1");
        let documents = InMemoryDocumentStore::new();
        let collection = CollectionId::for_principal(&PrincipalId::new("u1"));
        let id = documents.insert(&collection, Item::new("milk").to_fields());
        let item_ref = ItemRef {
            id: id.clone(),
            item: Item::new("milk"),
        };

        let mut state = state_for("u1", &[]);
        let effects =
            SyncReducer.reduce(&mut state, SyncAction::Toggle(item_ref), &env(&auth, &documents));
        run_effects(effects).await;

        assert_eq!(
            documents.operations(),
            vec![Operation::Update {
                collection,
                document: id,
                field: "isDone".into(),
                value: Value::Bool(true),
            }]
        );
    }

    #[test]
    fn writes_without_session_touch_nothing() {
        let auth = MockAuthProvider::new();
        let documents = InMemoryDocumentStore::new();
        let item_ref = ItemRef {
            id: DocumentId::new("d0"),
            item: Item::new("milk"),
        };
        let mut state = state_for("u1", &["milk"]);
        let before = state.clone();

        for action in [
            SyncAction::Add(Item::new("x")),
            SyncAction::Delete(item_ref.clone()),
            SyncAction::Toggle(item_ref),
        ] {
            let effects = SyncReducer.reduce(&mut state, action, &env(&auth, &documents));
            assert!(effects.is_empty());
        }

        assert_eq!(state, before);
        assert!(documents.operations().is_empty());
    }

    #[tokio::test]
    async fn writes_stop_when_provider_switches_user() {
        let auth = signed_in("u1");
        let documents = InMemoryDocumentStore::new();
        let u1 = CollectionId::for_principal(&PrincipalId::new("u1"));
        let id = documents.insert(&u1, Item::new("milk").to_fields());
        let shown = ItemRef {
            id,
            item: Item::new("milk"),
        };
        let mut state = state_for("u1", &[]);

        // The provider now reports another user while u1's list is on screen.
        auth.set_session(Some(Session::new(PrincipalId::new("u2"))));

        for action in [
            SyncAction::Toggle(shown.clone()),
            SyncAction::Delete(shown),
            SyncAction::Add(Item::new("x")),
        ] {
            let effects = SyncReducer.reduce(&mut state, action, &env(&auth, &documents));
            assert!(effects.is_empty());
        }

        assert!(documents.operations().is_empty());
        assert_eq!(state.principal, Some(PrincipalId::new("u1")));
        assert_eq!(documents.documents(&u1).len(), 1);
    }

    #[tokio::test]
    async fn writes_target_the_shown_principal() {
        let auth = signed_in("u1");
        let documents = InMemoryDocumentStore::new();
        let mut state = state_for("u1", &[]);

        let effects = SyncReducer.reduce(
            &mut state,
            SyncAction::Add(Item::new("milk")),
            &env(&auth, &documents),
        );
        run_effects(effects).await;

        let operations = documents.operations();
        assert_eq!(operations.len(), 1);
        assert!(matches!(
            &operations[0],
            Operation::Create { collection, .. }
                if *collection == CollectionId::for_principal(&PrincipalId::new("u1"))
        ));
    }

    #[test]
    fn writes_before_first_subscribe_touch_nothing() {
        let auth = signed_in("u1");
        let documents = InMemoryDocumentStore::new();
        let mut state = SyncState::default();

        let effects = SyncReducer.reduce(
            &mut state,
            SyncAction::Add(Item::new("milk")),
            &env(&auth, &documents),
        );

        assert!(effects.is_empty());
        assert!(documents.operations().is_empty());
    }

    #[tokio::test]
    async fn failed_write_is_swallowed() {
        let auth = signed_in("u1");
        let documents = InMemoryDocumentStore::new();
        documents.fail_writes(DocumentStoreError::PermissionDenied(CollectionId::for_principal(
            &PrincipalId::new("u1"),
        )));
        let mut state = state_for("u1", &[]);

        let effects = SyncReducer.reduce(
            &mut state,
            SyncAction::Add(Item::new("milk")),
            &env(&auth, &documents),
        );
        run_effects(effects).await;

        assert_eq!(documents.write_count(), 1);
        assert!(state.items.is_empty());
    }

    #[test]
    fn item_ref_decodes_missing_flag_as_open() {
        let mut fields = Fields::new();
        fields.insert("text".into(), Value::from("milk"));
        let item_ref = ItemRef::from(&Document::new(DocumentId::new("d"), fields));
        assert!(!item_ref.item.is_done);
    }
}
