//! Mock identity provider.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use synclist_core::identity::{AuthProvider, ProviderKind, Session, SignInOutcome};

#[derive(Debug, Default)]
struct AuthState {
    session: Option<Session>,
    scripted: VecDeque<SignInOutcome>,
    sign_in_calls: usize,
    sign_out_calls: usize,
    requested_providers: Vec<Vec<ProviderKind>>,
}

/// Mock identity provider with scripted sign-in outcomes.
///
/// Each call to [`AuthProvider::sign_in`] consumes the next scripted outcome;
/// with nothing scripted the flow reports [`SignInOutcome::Cancelled`], like a
/// user dismissing the sign-in screen. A successful outcome becomes the
/// current session, and signing out clears it.
///
/// # Example
///
/// ```
/// use synclist_core::identity::{PrincipalId, Session, SignInOutcome};
/// use synclist_testing::mocks::MockAuthProvider;
///
/// let auth = MockAuthProvider::new()
///     .with_sign_in(SignInOutcome::Success(Session::new(PrincipalId::new("uid-1"))));
/// assert_eq!(auth.sign_in_calls(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockAuthProvider {
    state: Arc<Mutex<AuthState>>,
}

impl MockAuthProvider {
    /// Create a provider with no session and nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start out already signed in.
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        self.lock().session = Some(session);
        self
    }

    /// Queue the outcome of the next sign-in flow.
    #[must_use]
    pub fn with_sign_in(self, outcome: SignInOutcome) -> Self {
        self.script_sign_in(outcome);
        self
    }

    /// Queue the outcome of the next sign-in flow on a shared handle.
    pub fn script_sign_in(&self, outcome: SignInOutcome) {
        self.lock().scripted.push_back(outcome);
    }

    /// Replace the current session, as if it changed outside the app.
    pub fn set_session(&self, session: Option<Session>) {
        self.lock().session = session;
    }

    /// Number of sign-in flows started.
    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.lock().sign_in_calls
    }

    /// Number of sign-outs requested.
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.lock().sign_out_calls
    }

    /// Provider sets passed to each sign-in flow, oldest first.
    #[must_use]
    pub fn requested_providers(&self) -> Vec<Vec<ProviderKind>> {
        self.lock().requested_providers.clone()
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuthProvider for MockAuthProvider {
    fn current_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    fn sign_in(
        &self,
        providers: Vec<ProviderKind>,
    ) -> Pin<Box<dyn Future<Output = SignInOutcome> + Send + '_>> {
        let outcome = {
            let mut state = self.lock();
            state.sign_in_calls += 1;
            state.requested_providers.push(providers);

            let outcome = state
                .scripted
                .pop_front()
                .unwrap_or(SignInOutcome::Cancelled);
            if let SignInOutcome::Success(session) = &outcome {
                state.session = Some(session.clone());
            }
            outcome
        };
        tracing::debug!(?outcome, "Mock sign-in finished");
        Box::pin(async move { outcome })
    }

    fn sign_out(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        {
            let mut state = self.lock();
            state.sign_out_calls += 1;
            state.session = None;
        }
        Box::pin(async {})
    }
}
