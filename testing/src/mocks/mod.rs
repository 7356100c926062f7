//! In-memory collaborators for tests and demos.
//!
//! Both mocks are cheap to clone; clones share state, so a test can keep one
//! handle for inspection and hand another to the environment.

mod auth;
mod document_store;

pub use auth::MockAuthProvider;
pub use document_store::{InMemoryDocumentStore, Operation};
