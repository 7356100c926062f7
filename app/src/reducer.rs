//! The todo list screen as one reducer.
//!
//! The screen controller and the sync view-model are separate reducers
//! scoped into [`AppState`]. The only coupling between them lives here: the
//! list subscribes for the principal of the screen's session when the screen
//! becomes authenticated, and is reset when it stops being authenticated.

use crate::screen::{ScreenAction, ScreenEnvironment, ScreenPhase, ScreenReducer, ScreenState};
use crate::sync::{SyncAction, SyncEnvironment, SyncReducer, SyncState};
use std::sync::Arc;
use synclist_core::composition::{ScopedReducer, scope_reducer};
use synclist_core::document::DocumentStore;
use synclist_core::identity::{AuthProvider, ProviderKind};
use synclist_core::{Effect, Reducer, SmallVec};

/// State of the whole screen
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppState {
    /// Sign-in lifecycle
    pub screen: ScreenState,
    /// Live item list
    pub sync: SyncState,
}

/// Actions of the whole screen
#[derive(Clone, Debug)]
pub enum AppAction {
    /// Screen controller input
    Screen(ScreenAction),
    /// Sync view-model input
    Sync(SyncAction),
}

/// Collaborators of the whole screen
#[derive(Clone)]
pub struct AppEnvironment {
    /// Screen controller collaborators
    pub screen: ScreenEnvironment,
    /// Sync view-model collaborators
    pub sync: SyncEnvironment,
}

impl AppEnvironment {
    /// Wire both features to the same identity provider.
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        documents: Arc<dyn DocumentStore>,
        providers: Vec<ProviderKind>,
    ) -> Self {
        Self {
            screen: ScreenEnvironment::new(Arc::clone(&auth), providers),
            sync: SyncEnvironment::new(auth, documents),
        }
    }
}

type ScreenScope = ScopedReducer<AppState, AppAction, AppEnvironment, ScreenReducer>;
type SyncScope = ScopedReducer<AppState, AppAction, AppEnvironment, SyncReducer>;

/// Reducer for the whole screen
pub struct AppReducer {
    screen: ScreenScope,
    sync: SyncScope,
}

impl AppReducer {
    /// Creates a new `AppReducer`
    #[must_use]
    pub fn new() -> Self {
        Self {
            screen: scope_reducer(
                ScreenReducer::new(),
                |state: &mut AppState| &mut state.screen,
                |action| match action {
                    AppAction::Screen(action) => Some(action),
                    AppAction::Sync(_) => None,
                },
                AppAction::Screen,
                |env: &AppEnvironment| &env.screen,
            ),
            sync: scope_reducer(
                SyncReducer::new(),
                |state: &mut AppState| &mut state.sync,
                |action| match action {
                    AppAction::Sync(action) => Some(action),
                    AppAction::Screen(_) => None,
                },
                AppAction::Sync,
                |env: &AppEnvironment| &env.sync,
            ),
        }
    }
}

impl Default for AppReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for AppReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let was_authenticated = state.screen.phase == ScreenPhase::Authenticated;

        let mut effects = match action {
            action @ AppAction::Screen(_) => self.screen.reduce(state, action, env),
            action @ AppAction::Sync(_) => self.sync.reduce(state, action, env),
        };

        let is_authenticated = state.screen.phase == ScreenPhase::Authenticated;
        let follow_up = match (was_authenticated, is_authenticated) {
            (false, true) => state
                .screen
                .session
                .as_ref()
                .map(|session| SyncAction::Subscribe(session.principal.clone())),
            (true, false) => Some(SyncAction::Reset),
            _ => None,
        };
        if let Some(follow_up) = follow_up {
            tracing::debug!(?follow_up, phase = ?state.screen.phase, "Authentication changed");
            effects.extend(self.sync.reduce(state, AppAction::Sync(follow_up), env));
        }

        effects
    }
}
