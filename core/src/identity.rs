//! Identity provider abstraction and session types.
//!
//! The application never owns authentication. It asks an [`AuthProvider`] to
//! run a sign-in flow, reads the current [`Session`] when it needs to address
//! the user's data, and asks the provider to sign out.
//!
//! # Example
//!
//! ```
//! use synclist_core::identity::{PrincipalId, Session};
//!
//! let session = Session::new(PrincipalId::new("uid-42")).with_email("ana@example.com");
//! assert_eq!(session.principal.as_str(), "uid-42");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `PrincipalId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid principal ID: {0}")]
pub struct ParsePrincipalIdError(String);

/// Stable identifier of an authenticated user, issued by the identity provider.
///
/// Every item operation is parameterized by the principal of the current
/// session; the principal also names the user's document collection.
///
/// - `FromStr::from_str()`: rejects empty strings (external input)
/// - `new()` / `From`: no validation (provider-issued input)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Create a new `PrincipalId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the principal ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrincipalId {
    type Err = ParsePrincipalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParsePrincipalIdError(
                "Principal ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The authenticated-user context handed out by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Principal used to namespace data access
    pub principal: PrincipalId,
    /// Email the user signed in with, when the provider reports it
    pub email: Option<String>,
}

impl Session {
    /// Create a session for `principal` without an email
    #[must_use]
    pub const fn new(principal: PrincipalId) -> Self {
        Self {
            principal,
            email: None,
        }
    }

    /// Attach the sign-in email
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Credential providers a sign-in flow may offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Email and password
    Email,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
        }
    }
}

/// Result of an external sign-in flow.
///
/// There is no fourth outcome: the flow either produced a session, failed,
/// or was dismissed by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The user signed in
    Success(Session),
    /// The provider reported an error
    Failure {
        /// Provider-supplied reason, for logs only
        reason: String,
    },
    /// The user dismissed the flow
    Cancelled,
}

impl SignInOutcome {
    /// Returns `true` if the flow produced a session
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Identity provider abstraction.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be held as `Arc<dyn AuthProvider>` and captured by effects.
pub trait AuthProvider: Send + Sync {
    /// The currently signed-in session, if any.
    ///
    /// This is a cheap read of the provider's cached handle and never blocks
    /// on the network.
    fn current_session(&self) -> Option<Session>;

    /// Run the provider's sign-in flow restricted to `providers`.
    fn sign_in(
        &self,
        providers: Vec<ProviderKind>,
    ) -> Pin<Box<dyn Future<Output = SignInOutcome> + Send + '_>>;

    /// Sign the current user out; resolves once the provider is done.
    fn sign_out(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code can use unwrap

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn principal_id_parse_rejects_empty() {
        assert!("".parse::<PrincipalId>().is_err());
        assert!("   ".parse::<PrincipalId>().is_err());
        assert_eq!("uid-1".parse::<PrincipalId>(), Ok(PrincipalId::new("uid-1")));
    }

    #[test]
    fn parse_error_display() {
        let error = "".parse::<PrincipalId>().unwrap_err();
        assert!(format!("{error}").contains("cannot be empty"));
    }

    #[test]
    fn sign_in_outcome_success_only_for_sessions() {
        assert!(SignInOutcome::Success(Session::new("u".into())).is_success());
        assert!(!SignInOutcome::Cancelled.is_success());
        assert!(
            !SignInOutcome::Failure {
                reason: "network".into()
            }
            .is_success()
        );
    }

    #[test]
    fn provider_kind_display() {
        assert_eq!(ProviderKind::Email.to_string(), "email");
    }

    proptest! {
        #[test]
        fn non_blank_ids_parse_unchanged(id in "[a-zA-Z0-9_-]{1,28}") {
            prop_assert_eq!(id.parse::<PrincipalId>(), Ok(PrincipalId::new(id.clone())));
        }

        #[test]
        fn blank_ids_are_rejected(id in "[ \t\n]{0,8}") {
            prop_assert!(id.parse::<PrincipalId>().is_err());
        }
    }
}
