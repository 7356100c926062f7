//! Per-user synchronized todo list.
//!
//! A single screen that signs the user in through an external identity
//! provider and shows a live list of todo items kept in that user's own
//! collection of a realtime document store. It demonstrates:
//!
//! - A sign-in lifecycle modeled as a reducer ([`ScreenReducer`])
//! - A live, wholesale-replaced projection of remote data ([`SyncReducer`])
//! - Composing both with `scope_reducer` ([`AppReducer`])
//! - Testing against in-memory collaborators
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use synclist_core::identity::{PrincipalId, Session};
//! use synclist_testing::mocks::{InMemoryDocumentStore, MockAuthProvider};
//! use todolist::{AppConfig, TodoScreen};
//!
//! # async fn example() -> Result<(), todolist::ScreenError> {
//! let auth = MockAuthProvider::new().with_session(Session::new(PrincipalId::new("uid-1")));
//! let mut screen = TodoScreen::new(
//!     &AppConfig::default(),
//!     Arc::new(auth),
//!     Arc::new(InMemoryDocumentStore::new()),
//! );
//!
//! screen.start().await?;
//! screen.type_text("Buy milk");
//! screen.submit().await?;
//! screen
//!     .wait_until(Duration::from_secs(1), |s| s.sync.items.len() == 1)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod presentation;
pub mod reducer;
pub mod screen;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use app::{ScreenError, TodoScreen, TodoStore};
pub use config::AppConfig;
pub use presentation::{Gesture, ListPresentation, Row, TextStyle};
pub use reducer::{AppAction, AppEnvironment, AppReducer, AppState};
pub use screen::{MenuItem, ScreenAction, ScreenPhase, ScreenReducer, ScreenState};
pub use sync::{SNAPSHOT_SUBSCRIPTION, SyncAction, SyncEnvironment, SyncReducer, SyncState};
pub use types::{Item, ItemRef};
