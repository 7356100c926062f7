//! The todo list screen wired to a running store.

use crate::config::AppConfig;
use crate::presentation::{Gesture, ListPresentation};
use crate::reducer::{AppAction, AppEnvironment, AppReducer, AppState};
use crate::screen::{MenuItem, ScreenAction, ScreenPhase};
use owo_colors::OwoColorize;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use synclist_core::document::DocumentStore;
use synclist_core::identity::AuthProvider;
use synclist_runtime::{Store, StoreError};
use thiserror::Error;
use tokio::sync::watch;

/// Store running the whole screen.
pub type TodoStore = Store<AppState, AppAction, AppEnvironment, AppReducer>;

/// Errors surfaced while driving the screen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScreenError {
    /// The store refused the action.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The awaited state did not show up in time.
    #[error("Timed out after {0:?} waiting for the screen")]
    Timeout(Duration),

    /// The store stopped publishing state.
    #[error("Screen state is no longer published")]
    Closed,
}

/// The todo list screen: a store plus the list presentation that mirrors it.
///
/// Gestures go through the presentation, which turns them into view-model
/// actions. State changes reach the presentation through
/// [`refresh`](Self::refresh) or [`wait_until`](Self::wait_until).
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use synclist_testing::mocks::{InMemoryDocumentStore, MockAuthProvider};
/// use todolist::{AppConfig, ScreenPhase, TodoScreen};
///
/// # async fn example() -> Result<(), todolist::ScreenError> {
/// let mut screen = TodoScreen::new(
///     &AppConfig::default(),
///     Arc::new(MockAuthProvider::new()),
///     Arc::new(InMemoryDocumentStore::new()),
/// );
/// screen.start().await?;
/// screen
///     .wait_until(Duration::from_secs(1), |s| s.screen.phase != ScreenPhase::Unauthenticated)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct TodoScreen {
    store: TodoStore,
    states: watch::Receiver<AppState>,
    presentation: ListPresentation,
}

impl TodoScreen {
    /// Build the screen around the given collaborators.
    #[must_use]
    pub fn new(
        config: &AppConfig,
        auth: Arc<dyn AuthProvider>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let environment = AppEnvironment::new(auth, documents, config.providers.clone());
        let store = Store::with_config(
            AppState::default(),
            AppReducer::new(),
            environment,
            config.store.clone(),
        );
        let states = store.subscribe_state();

        Self {
            store,
            states,
            presentation: ListPresentation::new(),
        }
    }

    /// The screen became visible.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Store`] if the store is shutting down.
    pub async fn start(&mut self) -> Result<(), ScreenError> {
        self.send(AppAction::Screen(ScreenAction::Start)).await
    }

    /// Replace the text in the entry field.
    pub fn type_text(&mut self, text: impl Into<String>) {
        self.presentation.set_entry(text);
    }

    /// Submit the entry field as a new item.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Store`] if the store is shutting down.
    pub async fn submit(&mut self) -> Result<(), ScreenError> {
        let text = self.presentation.entry().to_string();
        self.gesture(Gesture::Submit(text)).await.map(|_| ())
    }

    /// Tap the label of row `index`. Returns `false` if there is no such row.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Store`] if the store is shutting down.
    pub async fn tap_label(&mut self, index: usize) -> Result<bool, ScreenError> {
        self.gesture(Gesture::TapLabel(index)).await
    }

    /// Tap the delete icon of row `index`. Returns `false` if there is no such row.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Store`] if the store is shutting down.
    pub async fn tap_delete(&mut self, index: usize) -> Result<bool, ScreenError> {
        self.gesture(Gesture::TapDelete(index)).await
    }

    /// Choose a menu entry.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Store`] if the store is shutting down.
    pub async fn select_menu(&mut self, item: MenuItem) -> Result<(), ScreenError> {
        self.send(AppAction::Screen(ScreenAction::MenuItemSelected(item)))
            .await
    }

    /// Pull the latest state into the presentation.
    ///
    /// Returns `true` if the list was redrawn.
    pub fn refresh(&mut self) -> bool {
        let state = self.states.borrow_and_update();
        self.presentation.apply(&state.sync)
    }

    /// Wait for a state matching `predicate`, then refresh the presentation.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Timeout`] if no matching state is published in
    /// time, or [`ScreenError::Closed`] if the store is gone.
    pub async fn wait_until<F>(
        &mut self,
        timeout: Duration,
        predicate: F,
    ) -> Result<AppState, ScreenError>
    where
        F: FnMut(&AppState) -> bool,
    {
        let state = match tokio::time::timeout(timeout, self.states.wait_for(predicate)).await {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => return Err(ScreenError::Closed),
            Err(_) => return Err(ScreenError::Timeout(timeout)),
        };
        self.presentation.apply(&state.sync);
        Ok(state)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ScreenPhase {
        self.states.borrow().screen.phase
    }

    /// The list as last refreshed.
    #[must_use]
    pub const fn presentation(&self) -> &ListPresentation {
        &self.presentation
    }

    /// The store running the screen.
    #[must_use]
    pub const fn store(&self) -> &TodoStore {
        &self.store
    }

    /// Write a header with the signed-in user, then the list.
    ///
    /// # Errors
    ///
    /// Returns any error from `out`.
    pub fn render<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        let user = {
            let state = self.states.borrow();
            state
                .screen
                .session
                .as_ref()
                .map(|session| match &session.email {
                    Some(email) => email.clone(),
                    None => session.principal.to_string(),
                })
        };
        match user {
            Some(user) => writeln!(out, "{} {}", "Todo list of".bold(), user.cyan())?,
            None => writeln!(out, "{}", "Todo list".bold())?,
        }
        self.presentation.render(out)
    }

    /// Stop the store, aborting the live subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Store`] if pending effects outlive the configured
    /// shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), ScreenError> {
        self.store
            .shutdown(self.store.config().shutdown_timeout)
            .await?;
        Ok(())
    }

    async fn gesture(&mut self, gesture: Gesture) -> Result<bool, ScreenError> {
        match self.presentation.gesture(gesture) {
            Some(action) => {
                self.send(AppAction::Sync(action)).await?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn send(&self, action: AppAction) -> Result<(), ScreenError> {
        self.store.send(action).await?;
        Ok(())
    }
}
