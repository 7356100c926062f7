//! Application configuration.
//!
//! There is no config file and the application reads no environment
//! variables of its own; embedders build an [`AppConfig`] in code.

use synclist_core::identity::ProviderKind;
use synclist_runtime::StoreConfig;

/// Configuration for the todo list screen.
///
/// # Example
///
/// ```
/// use synclist_core::identity::ProviderKind;
/// use todolist::AppConfig;
///
/// let config = AppConfig::default().with_log_filter("todolist=debug");
/// assert_eq!(config.providers, vec![ProviderKind::Email]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Credential providers offered by the sign-in flow.
    ///
    /// Default: email only
    pub providers: Vec<ProviderKind>,

    /// Runtime settings for the screen's store.
    pub store: StoreConfig,

    /// `tracing` filter used when `RUST_LOG` is not set.
    ///
    /// Default: `"info"`
    pub log_filter: String,
}

impl AppConfig {
    /// Create a configuration offering `providers`.
    #[must_use]
    pub fn new(providers: Vec<ProviderKind>) -> Self {
        Self {
            providers,
            ..Self::default()
        }
    }

    /// Set the store runtime settings.
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Set the fallback log filter.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderKind::Email],
            store: StoreConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}
