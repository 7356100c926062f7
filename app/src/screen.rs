//! Screen controller: the sign-in lifecycle around the list.
//!
//! ```text
//! Unauthenticated --login--> AwaitingSignIn
//! AwaitingSignIn --success--> Authenticated
//! AwaitingSignIn --failure/cancel--> Terminated
//! Authenticated --logout, after sign-out completes--> AwaitingSignIn
//! ```
//!
//! `Terminated` is absorbing: a failed or dismissed sign-in closes the
//! screen and nothing is retried.

use std::fmt;
use std::sync::Arc;
use synclist_core::identity::{AuthProvider, ProviderKind, Session, SignInOutcome};
use synclist_core::{Effect, Reducer, SmallVec, smallvec};

/// Lifecycle phase of the screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScreenPhase {
    /// Nothing has happened yet
    #[default]
    Unauthenticated,
    /// The external sign-in flow is running
    AwaitingSignIn,
    /// A session exists and the list is live
    Authenticated,
    /// Sign-in failed or was dismissed; the screen is closed
    Terminated,
}

/// Entries of the screen's options menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuItem {
    /// Sign out, then sign in again
    Logout,
}

impl MenuItem {
    /// Every menu entry, in display order.
    pub const ALL: [Self; 1] = [Self::Logout];

    /// Menu label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State of the screen controller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScreenState {
    /// Current phase
    pub phase: ScreenPhase,
    /// Session the screen was authenticated with; the list is subscribed for
    /// its principal
    pub session: Option<Session>,
    /// A sign-out is in flight
    pub signing_out: bool,
}

/// Inputs of the screen controller.
#[derive(Clone, Debug)]
pub enum ScreenAction {
    /// The screen became visible
    Start,
    /// Run the sign-in flow
    Login,
    /// The sign-in flow finished
    SignInCompleted(SignInOutcome),
    /// A menu entry was chosen
    MenuItemSelected(MenuItem),
    /// Sign the current user out
    Logout,
    /// The identity provider finished signing out
    SignOutCompleted,
}

/// Collaborators of the screen controller.
#[derive(Clone)]
pub struct ScreenEnvironment {
    /// Identity provider
    pub auth: Arc<dyn AuthProvider>,
    /// Providers offered by the sign-in flow
    pub providers: Vec<ProviderKind>,
}

impl ScreenEnvironment {
    /// Creates a new `ScreenEnvironment`
    #[must_use]
    pub fn new(auth: Arc<dyn AuthProvider>, providers: Vec<ProviderKind>) -> Self {
        Self { auth, providers }
    }
}

/// Reducer for the screen controller
#[derive(Clone, Debug, Default)]
pub struct ScreenReducer;

impl ScreenReducer {
    /// Creates a new `ScreenReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn login(
        state: &mut ScreenState,
        env: &ScreenEnvironment,
    ) -> SmallVec<[Effect<ScreenAction>; 4]> {
        tracing::info!(providers = ?env.providers, "Starting sign-in");
        state.phase = ScreenPhase::AwaitingSignIn;

        let auth = Arc::clone(&env.auth);
        let providers = env.providers.clone();
        smallvec![Effect::future(async move {
            Some(ScreenAction::SignInCompleted(auth.sign_in(providers).await))
        })]
    }

    fn logout(
        state: &mut ScreenState,
        env: &ScreenEnvironment,
    ) -> SmallVec<[Effect<ScreenAction>; 4]> {
        if state.phase != ScreenPhase::Authenticated || state.signing_out {
            return SmallVec::new();
        }
        tracing::info!("Signing out");
        state.signing_out = true;

        let auth = Arc::clone(&env.auth);
        smallvec![Effect::future(async move {
            auth.sign_out().await;
            Some(ScreenAction::SignOutCompleted)
        })]
    }
}

impl Reducer for ScreenReducer {
    type State = ScreenState;
    type Action = ScreenAction;
    type Environment = ScreenEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if state.phase == ScreenPhase::Terminated {
            tracing::debug!(?action, "Screen terminated, ignoring action");
            return SmallVec::new();
        }

        match action {
            ScreenAction::Start => {
                if state.phase != ScreenPhase::Unauthenticated {
                    return SmallVec::new();
                }
                match env.auth.current_session() {
                    Some(session) => {
                        tracing::info!(principal = %session.principal, "Resuming existing session");
                        state.phase = ScreenPhase::Authenticated;
                        state.session = Some(session);
                        SmallVec::new()
                    },
                    None => Self::login(state, env),
                }
            },

            ScreenAction::Login => {
                if state.phase != ScreenPhase::Unauthenticated {
                    return SmallVec::new();
                }
                Self::login(state, env)
            },

            ScreenAction::SignInCompleted(outcome) => {
                if state.phase != ScreenPhase::AwaitingSignIn {
                    tracing::debug!("Ignoring sign-in result outside of sign-in");
                    return SmallVec::new();
                }
                match outcome {
                    SignInOutcome::Success(session) => {
                        tracing::info!(principal = %session.principal, "Signed in");
                        state.phase = ScreenPhase::Authenticated;
                        state.session = Some(session);
                    },
                    SignInOutcome::Failure { reason } => {
                        tracing::warn!(%reason, "Sign-in failed, closing screen");
                        state.phase = ScreenPhase::Terminated;
                    },
                    SignInOutcome::Cancelled => {
                        tracing::info!("Sign-in cancelled, closing screen");
                        state.phase = ScreenPhase::Terminated;
                    },
                }
                SmallVec::new()
            },

            ScreenAction::MenuItemSelected(MenuItem::Logout) | ScreenAction::Logout => {
                Self::logout(state, env)
            },

            ScreenAction::SignOutCompleted => {
                if !state.signing_out {
                    return SmallVec::new();
                }
                state.signing_out = false;
                state.session = None;
                Self::login(state, env)
            },
        }
    }
}
