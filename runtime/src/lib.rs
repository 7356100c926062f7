//! # Synclist Runtime
//!
//! Runtime implementation for the synclist architecture.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: Owns state, runs the reducer, executes effects
//! - **Feedback loop**: Actions produced by effects are sent back to the store
//! - **Observation**: State is republished on a `watch` channel after every
//!   action, and actions produced by effects are broadcast to observers
//!
//! ## Example
//!
//! ```ignore
//! use synclist_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//!
//! // Observe every new state
//! let mut states = store.subscribe_state();
//! states.changed().await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use synclist_core::{Effect, EffectId, Reducer};
use tokio::sync::{RwLock, watch};
use tokio::task::AbortHandle;

/// Metric descriptions
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// The store is shutting down and no longer accepts actions.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out with effects still running.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

pub use error::StoreError;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use synclist_runtime::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_broadcast_capacity(64)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.broadcast_capacity, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Capacity of the channel broadcasting actions produced by effects
    pub broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(broadcast_capacity: usize, shutdown_timeout: Duration) -> Self {
        Self {
            broadcast_capacity,
            shutdown_timeout,
        }
    }

    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`]. Waiting on it resolves once every one-shot
/// effect started by that action has finished. Stream effects are open-ended
/// and are not tracked.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Save).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (_tx, rx) = watch::channel(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Wait for all tracked effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker is gone, so nothing is left running.
                break;
            }
        }
    }

    /// Wait for all tracked effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the timeout expires before all effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), ()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ())
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// Keeps the counter correct even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Running stream effects, keyed by id.
///
/// The generation distinguishes a stream from the one that replaced it, so a
/// finishing stream never unregisters its successor.
#[derive(Default)]
struct StreamRegistry {
    next_generation: AtomicU64,
    running: Mutex<RunningStreams>,
}

type RunningStreams = HashMap<EffectId, (u64, AbortHandle)>;

impl StreamRegistry {
    fn lock(&self) -> MutexGuard<'_, RunningStreams> {
        // A poisoned map is still structurally valid; keep using it.
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self, id: EffectId) -> bool {
        match self.lock().remove(&id) {
            Some((_, handle)) => {
                handle.abort();
                true
            },
            None => false,
        }
    }

    fn finished(&self, id: EffectId, generation: u64) {
        let mut running = self.lock();
        if running.get(&id).is_some_and(|(current, _)| *current == generation) {
            running.remove(&id);
        }
    }

    fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, (_, handle)) in &drained {
            handle.abort();
        }
        drained.len()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Store module - the runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Reducer, RwLock, StoreConfig, StoreError,
        StreamRegistry, watch,
    };
    use futures::StreamExt;
    use tokio::sync::broadcast;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (screen logic)
    /// 3. Environment (injected collaborators)
    /// 4. Effect execution (with feedback loop)
    /// 5. Observation (state `watch`, action `broadcast`)
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        config: StoreConfig,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        streams: Arc<StreamRegistry>,
        /// Latest state, republished after every reduction.
        state_watch: Arc<watch::Sender<S>>,
        /// Actions produced by effects, for observers.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// Uses [`StoreConfig::default`].
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new store with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
            let (state_watch, _) = watch::channel(initial_state.clone());

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                config,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                streams: Arc::new(StreamRegistry::default()),
                state_watch: Arc::new(state_watch),
                action_broadcast,
            }
        }

        /// The configuration this store was built with
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Republishes the new state to `watch` subscribers
        /// 4. Starts the returned effects; they may send more actions
        ///
        /// `send()` returns after starting effect execution, not completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            tracing::debug!("Processing action");
            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                // Published while the write lock is held so observers see
                // states in reduction order.
                self.state_watch.send_replace((*state).clone());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect, &tracking);
            }

            Ok(handle)
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Subscribe to state updates
        ///
        /// The receiver always holds the latest state; intermediate states may
        /// be skipped by slow readers.
        #[must_use]
        pub fn subscribe_state(&self) -> watch::Receiver<S> {
            self.state_watch.subscribe()
        }

        /// Subscribe to actions produced by effects
        ///
        /// Actions passed directly to [`send`](Self::send) are not broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Number of stream effects currently running
        #[must_use]
        pub fn running_streams(&self) -> usize {
            self.streams.len()
        }

        /// Initiate graceful shutdown of the store
        ///
        /// 1. Sets the shutdown flag (rejecting new actions)
        /// 2. Aborts every running stream effect
        /// 3. Waits for pending one-shot effects, up to `timeout`
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let aborted = self.streams.cancel_all();
            if aborted > 0 {
                tracing::debug!(aborted, "Aborted running streams");
                metrics::counter!("store.subscriptions.cancelled").increment(aborted as u64);
            }

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timeout");
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Execute an effect
        ///
        /// - `None`: No-op
        /// - `Parallel`: Starts every child effect
        /// - `Future`: Runs on a spawned task, sends the resulting action if `Some`
        /// - `Stream`: Runs on a spawned task, sends every item; replaces a
        ///   running stream with the same id
        /// - `Cancel`: Aborts the running stream with that id
        ///
        /// Effects are fire-and-forget: a panicking effect task is isolated by
        /// tokio and the guards keep the counters correct.
        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking);
                    }
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    tracking.increment();

                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                    let guard = DecrementGuard(tracking.clone());
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;
                        let _pending_guard = pending_guard;

                        if let Some(action) = fut.await {
                            let _ = store.action_broadcast.send(action.clone());
                            let _ = store.send(action).await;
                        }
                    });
                },
                Effect::Stream { id, mut stream } => {
                    tracing::debug!(stream = %id, "Starting stream effect");
                    metrics::counter!("store.effects.executed", "type" => "stream").increment(1);

                    let store = self.clone();
                    let generation = self.streams.next_generation.fetch_add(1, Ordering::Relaxed);

                    // Spawn and register under one lock so the task can't
                    // unregister before it is registered.
                    let mut running = self.streams.lock();
                    let task = tokio::spawn(async move {
                        while let Some(action) = stream.next().await {
                            let _ = store.action_broadcast.send(action.clone());
                            if store.send(action).await.is_err() {
                                break;
                            }
                        }
                        tracing::debug!(stream = %id, "Stream effect finished");
                        store.streams.finished(id, generation);
                    });

                    if let Some((_, previous)) =
                        running.insert(id, (generation, task.abort_handle()))
                    {
                        tracing::debug!(stream = %id, "Replacing running stream");
                        metrics::counter!("store.subscriptions.cancelled").increment(1);
                        previous.abort();
                    }
                },
                Effect::Cancel(id) => {
                    metrics::counter!("store.effects.executed", "type" => "cancel").increment(1);
                    if self.streams.cancel(id) {
                        tracing::debug!(stream = %id, "Cancelled stream effect");
                        metrics::counter!("store.subscriptions.cancelled").increment(1);
                    }
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                config: self.config.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                streams: Arc::clone(&self.streams),
                state_watch: Arc::clone(&self.state_watch),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code can use unwrap

    use super::*;
    use synclist_core::{SmallVec, smallvec};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Checklist {
        checked: usize,
    }

    #[derive(Debug, Clone)]
    enum ChecklistAction {
        Check,
        Look,
        SaveThenCheck,
        SaveEach(usize),
        CrashingSave,
        SlowSave,
    }

    struct ChecklistReducer;

    impl Reducer for ChecklistReducer {
        type State = Checklist;
        type Action = ChecklistAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                ChecklistAction::Check => {
                    state.checked += 1;
                    SmallVec::new()
                },
                ChecklistAction::Look => smallvec![Effect::None],
                ChecklistAction::SaveThenCheck => {
                    smallvec![Effect::future(async { Some(ChecklistAction::Check) })]
                },
                ChecklistAction::SaveEach(n) => smallvec![Effect::merge(
                    (0..n)
                        .map(|_| Effect::future(async { Some(ChecklistAction::Check) }))
                        .collect()
                )],
                ChecklistAction::CrashingSave => {
                    #[allow(clippy::panic)] // Effect panics are isolated by the store
                    {
                        smallvec![Effect::future(async {
                            panic!("save crashed");
                        })]
                    }
                },
                ChecklistAction::SlowSave => smallvec![Effect::future(async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    None
                })],
            }
        }
    }

    type ChecklistStore = Store<Checklist, ChecklistAction, (), ChecklistReducer>;

    fn checklist() -> ChecklistStore {
        Store::new(Checklist::default(), ChecklistReducer, ())
    }

    async fn wait_for_checked(store: &ChecklistStore, n: usize) {
        let mut states = store.subscribe_state();
        tokio::time::timeout(Duration::from_secs(1), states.wait_for(|s| s.checked == n))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn reduces_sent_actions_in_place() {
        let store = checklist();

        store.send(ChecklistAction::Check).await.unwrap();
        store.send(ChecklistAction::Look).await.unwrap();

        assert_eq!(store.state(|s| s.checked).await, 1);
    }

    #[tokio::test]
    async fn future_result_is_fed_back() {
        let store = checklist();

        let mut handle = store.send(ChecklistAction::SaveThenCheck).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        wait_for_checked(&store, 1).await;
    }

    #[tokio::test]
    async fn parallel_futures_all_feed_back() {
        let store = checklist();

        store.send(ChecklistAction::SaveEach(3)).await.unwrap();

        wait_for_checked(&store, 3).await;
    }

    #[tokio::test]
    async fn panicking_effect_leaves_store_usable() {
        let store = checklist();

        let mut handle = store.send(ChecklistAction::CrashingSave).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        store.send(ChecklistAction::Check).await.unwrap();
        assert_eq!(store.state(|s| s.checked).await, 1);
    }

    #[tokio::test]
    async fn state_watch_is_updated_by_send() {
        let store = checklist();
        let mut states = store.subscribe_state();

        store.send(ChecklistAction::Check).await.unwrap();

        assert!(states.has_changed().unwrap());
        assert_eq!(states.borrow_and_update().checked, 1);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = checklist();

        store.shutdown(Duration::from_secs(1)).await.unwrap();

        let result = store.send(ChecklistAction::Check).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn shutdown_reports_unfinished_effects() {
        let store = checklist();

        store.send(ChecklistAction::SlowSave).await.unwrap();

        let result = store.shutdown(Duration::from_millis(20)).await;
        assert_eq!(result, Err(StoreError::ShutdownTimeout(1)));
    }

    #[test]
    fn store_config_setters_override_new() {
        let config = StoreConfig::new(8, Duration::from_secs(1))
            .with_broadcast_capacity(32)
            .with_shutdown_timeout(Duration::from_secs(2));
        assert_eq!(config, StoreConfig::new(32, Duration::from_secs(2)));
    }
}
