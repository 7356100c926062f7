//! Metric descriptions for the store runtime and the features built on it.
//!
//! Metrics are emitted through the `metrics` facade. Nothing is recorded
//! until the embedding application installs a recorder; calling
//! [`register_metrics`] afterwards attaches descriptions to every metric name
//! used in this workspace.
//!
//! # Example
//!
//! ```
//! synclist_runtime::metrics::register_metrics();
//! ```

use metrics::{describe_counter, describe_histogram};

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Register all metric descriptions.
pub fn register_metrics() {
    // Store Metrics
    describe_counter!(
        "store.commands.total",
        "Total number of actions sent to a store"
    );
    describe_counter!(
        "store.effects.executed",
        "Total number of effects executed, labelled by effect type"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken to run the reducer for one action"
    );
    describe_counter!(
        "store.subscriptions.cancelled",
        "Total number of stream effects aborted by cancel, replacement or shutdown"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Total number of actions rejected because the store was shutting down"
    );

    // Sync Metrics
    describe_counter!(
        "sync.snapshots.received",
        "Total number of collection snapshots applied to the item list"
    );
    describe_counter!(
        "sync.snapshots.discarded",
        "Total number of snapshots dropped because they belonged to a previous session"
    );
    describe_counter!(
        "sync.subscription.errors",
        "Total number of subscription errors swallowed by the view-model"
    );
    describe_counter!(
        "sync.writes.failed",
        "Total number of fire-and-forget writes the document store rejected"
    );
    describe_counter!(
        "sync.writes.skipped",
        "Total number of item operations skipped because no session existed"
    );
}
