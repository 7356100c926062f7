//! # Synclist Core
//!
//! Core traits and types for the synclist architecture.
//!
//! A screen is modeled as a reducer over plain state. Every interaction with
//! the outside world (signing in, talking to the document store, listening to
//! live snapshots) is described as an [`Effect`] value and executed later by
//! the runtime crate.
//!
//! ## Core Concepts
//!
//! - **State**: Owned, cloneable data for a feature
//! - **Action**: All possible inputs to a reducer (user gestures and results)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected collaborators ([`identity::AuthProvider`],
//!   [`document::DocumentStore`])
//!
//! ## Example
//!
//! ```
//! use synclist_core::{smallvec, Effect, Reducer, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct DraftState {
//!     text: String,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum DraftAction {
//!     Typed(String),
//!     Cleared,
//! }
//!
//! struct DraftReducer;
//!
//! impl Reducer for DraftReducer {
//!     type State = DraftState;
//!     type Action = DraftAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut DraftState,
//!         action: DraftAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<DraftAction>; 4]> {
//!         match action {
//!             DraftAction::Typed(text) => state.text = text,
//!             DraftAction::Cleared => state.text.clear(),
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = DraftState::default();
//! let _ = DraftReducer.reduce(&mut state, DraftAction::Typed("milk".into()), &());
//! assert_eq!(state.text, "milk");
//! ```

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

pub use effect::{Effect, EffectId};
pub use reducer::Reducer;

/// Scoping reducers into a larger feature
pub mod composition;

/// Live document store collaborator and its value types
pub mod document;

/// Identity provider collaborator and session types
pub mod identity;

/// Reducer module - The core trait for screen logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They never perform I/O themselves; they describe it with effects.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for screen and view-model logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected collaborators this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected collaborators
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates `state` in place and returns effect descriptions for the
        /// runtime to execute. Most reducers return at most a handful of
        /// effects, so the result lives inline in a `SmallVec`.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects are values returned from reducers and executed by the store
/// runtime. A `Future` effect runs once; a `Stream` effect keeps feeding
/// actions back until it ends or is cancelled by id.
pub mod effect {
    use futures::{Stream, StreamExt};
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;

    /// Identifies a long-running effect so it can be replaced or cancelled.
    ///
    /// Starting a stream effect whose id is already running aborts the old
    /// stream first.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EffectId(&'static str);

    impl EffectId {
        /// Create an effect id from a static name
        #[must_use]
        pub const fn new(name: &'static str) -> Self {
            Self(name)
        }

        /// The name this id was created with
        #[must_use]
        pub const fn as_str(&self) -> &'static str {
            self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    /// Boxed future produced by a one-shot effect
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Boxed stream produced by a long-running effect
    pub type EffectStream<Action> = Pin<Box<dyn Stream<Item = Action> + Send>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if `Some`, the action is fed back into the reducer
        Future(EffectFuture<Action>),

        /// Long-running subscription; every item is fed back into the reducer
        Stream {
            /// Id used to replace or cancel this stream
            id: EffectId,
            /// The stream of actions
            stream: EffectStream<Action>,
        },

        /// Abort the running stream with this id, if any
        Cancel(EffectId),
    }

    // Manual Debug implementation since futures and streams don't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Stream { id, .. } => f
                    .debug_struct("Effect::Stream")
                    .field("id", id)
                    .finish_non_exhaustive(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Wrap a future as a one-shot effect
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Wrap a stream as a long-running effect identified by `id`
        pub fn stream<S>(id: EffectId, stream: S) -> Self
        where
            S: Stream<Item = Action> + Send + 'static,
        {
            Effect::Stream {
                id,
                stream: Box::pin(stream),
            }
        }

        /// Returns `true` for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// Transform every action this effect can produce
        ///
        /// Used to lift a child reducer's effects into its parent's action type.
        #[must_use]
        pub fn map<B>(self, f: fn(Action) -> B) -> Effect<B>
        where
            Action: Send + 'static,
            B: Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => {
                    Effect::Parallel(effects.into_iter().map(|effect| effect.map(f)).collect())
                },
                Effect::Future(fut) => Effect::Future(Box::pin(async move { fut.await.map(f) })),
                Effect::Stream { id, stream } => Effect::Stream {
                    id,
                    stream: Box::pin(stream.map(f)),
                },
                Effect::Cancel(id) => Effect::Cancel(id),
            }
        }
    }
}
