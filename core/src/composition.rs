//! Reducer composition utilities
//!
//! A screen is usually assembled from smaller features, each with its own
//! state, action and environment. [`scope_reducer`] embeds such a child
//! reducer into a parent: it focuses on one field of the parent state, only
//! sees the parent actions that belong to it, reads its environment out of
//! the parent environment, and lifts its effects back into parent actions.
//!
//! # Example
//!
//! ```
//! use synclist_core::composition::scope_reducer;
//! use synclist_core::{smallvec, Effect, Reducer, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     count: i32,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         _action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         state.count += 1;
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! #[derive(Default)]
//! struct ScreenState {
//!     counter: CounterState,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum ScreenAction {
//!     Counter(CounterAction),
//!     Other,
//! }
//!
//! let scoped = scope_reducer(
//!     CounterReducer,
//!     |state: &mut ScreenState| &mut state.counter,
//!     |action| match action {
//!         ScreenAction::Counter(action) => Some(action),
//!         ScreenAction::Other => None,
//!     },
//!     ScreenAction::Counter,
//!     |_: &()| &(),
//! );
//!
//! let mut state = ScreenState::default();
//! let _ = scoped.reduce(&mut state, ScreenAction::Counter(CounterAction::Increment), &());
//! let _ = scoped.reduce(&mut state, ScreenAction::Other, &());
//! assert_eq!(state.counter.count, 1);
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// Embeds a child reducer into a parent state, action and environment.
///
/// - `state`: lens from the parent state to the child state
/// - `extract`: picks the child action out of a parent action (`None` = not ours)
/// - `embed`: wraps a child action produced by an effect into a parent action
/// - `environment`: lens from the parent environment to the child environment
#[must_use]
pub fn scope_reducer<S, A, E, R>(
    reducer: R,
    state: fn(&mut S) -> &mut R::State,
    extract: fn(A) -> Option<R::Action>,
    embed: fn(R::Action) -> A,
    environment: fn(&E) -> &R::Environment,
) -> ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    ScopedReducer {
        reducer,
        state,
        extract,
        embed,
        environment,
    }
}

/// A child reducer focused on part of a parent feature.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    reducer: R,
    state: fn(&mut S) -> &mut R::State,
    extract: fn(A) -> Option<R::Action>,
    embed: fn(R::Action) -> A,
    environment: fn(&E) -> &R::Environment,
}

impl<S, A, E, R> ScopedReducer<S, A, E, R>
where
    R: Reducer,
{
    /// The wrapped child reducer
    #[must_use]
    pub const fn inner(&self) -> &R {
        &self.reducer
    }
}

impl<S, A, E, R> Reducer for ScopedReducer<S, A, E, R>
where
    R: Reducer,
    R::Action: Send + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let Some(action) = (self.extract)(action) else {
            return SmallVec::new();
        };

        self.reducer
            .reduce((self.state)(state), action, (self.environment)(env))
            .into_iter()
            .map(|effect| effect.map(self.embed))
            .collect()
    }
}
