//! # Synclist Testing
//!
//! Testing utilities and helpers for synclist.
//!
//! This crate provides:
//! - In-memory implementations of the environment collaborators
//!   ([`mocks::InMemoryDocumentStore`], [`mocks::MockAuthProvider`])
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - Assertion helpers for the effects a reducer returns
//!
//! ## Example
//!
//! ```ignore
//! use synclist_testing::mocks::{InMemoryDocumentStore, MockAuthProvider};
//!
//! #[tokio::test]
//! async fn adds_an_item() {
//!     let documents = InMemoryDocumentStore::new();
//!     let auth = MockAuthProvider::new().with_session(session("uid-1"));
//!     let store = Store::new(SyncState::default(), SyncReducer, environment(&auth, &documents));
//!
//!     store.send(SyncAction::Add(Item::new("Buy milk"))).await?;
//!
//!     assert_eq!(documents.write_count(), 1);
//! }
//! ```

/// In-memory collaborators
pub mod mocks;


// Re-export commonly used items
pub use mocks::{InMemoryDocumentStore, MockAuthProvider};
pub use reducer_test::{ReducerTest, assertions};
