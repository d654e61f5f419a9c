//! Reactive Runtime
//!
//! The runtime is the entry point application code talks to. It owns a
//! tracking context and hands it to everything it creates:
//!
//! 1. [`Runtime::watch`] wraps a record in a [`Watched`] bound to the
//!    runtime's context.
//!
//! 2. [`Runtime::monitor`] creates a [`Reaction`] and keeps it registered
//!    until its [`Disposer`] runs.
//!
//! 3. [`Runtime::scoped_mutate`] runs a body in a mutation scope and fires
//!    the affected reactions.
//!
//! # Ownership
//!
//! Containers hold their subscribers weakly, so something else has to keep a
//! reaction alive. That is the runtime's registry. Dropping a [`Disposer`]
//! without calling it leaves the reaction running; observation only stops
//! when [`Disposer::dispose`] is called.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::TrackingContext;
use super::mutation::run_scoped;
use super::reaction::Reaction;
use super::subscriber::{Reactive, SubscriberId};
use super::watched::Watched;
use crate::error::Result;

/// Live reactions, keyed by subscriber ID.
type Registry = Mutex<IndexMap<SubscriberId, Arc<dyn Reactive>>>;

/// Handle that stops a reaction created by [`Runtime::monitor`].
///
/// Calling [`dispose`](Disposer::dispose) more than once is a no-op.
#[must_use = "a reaction keeps running until its disposer is called"]
pub struct Disposer {
    reaction: Arc<dyn Reactive>,
    registry: Weak<Registry>,
}

impl Disposer {
    /// Unsubscribe the reaction from everything it depends on.
    pub fn dispose(&self) {
        self.reaction.dispose();
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().shift_remove(&self.reaction.subscriber_id());
        }
    }

    /// Whether the reaction has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.reaction.is_disposed()
    }

    /// The subscriber ID of the reaction this disposer controls.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.reaction.subscriber_id()
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("subscriber_id", &self.reaction.subscriber_id())
            .field("disposed", &self.reaction.is_disposed())
            .finish()
    }
}

/// A reactive runtime: one tracking context plus the reactions bound to it.
///
/// Cloning a runtime yields another handle to the same state.
#[derive(Clone, Default)]
pub struct Runtime {
    context: Arc<TrackingContext>,
    reactions: Arc<Registry>,
}

impl Runtime {
    /// Create a runtime with a fresh tracking context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tracking context shared by everything this runtime creates.
    pub fn context(&self) -> &Arc<TrackingContext> {
        &self.context
    }

    /// Wrap `record` so reads and writes through it are tracked.
    pub fn watch<T>(&self, record: T) -> Watched<T>
    where
        T: Send + Sync + 'static,
    {
        Watched::new(Arc::clone(&self.context), record)
    }

    /// Run `effect` whenever the value computed by `query` changes.
    ///
    /// The query runs once immediately to discover its dependencies; the
    /// effect does not run for that first evaluation.
    pub fn monitor<T, Q, E>(&self, query: Q, effect: E) -> Result<Disposer>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        Q: Fn() -> T + Send + Sync + 'static,
        E: Fn(T) + Send + Sync + 'static,
    {
        let reaction: Arc<dyn Reactive> =
            Reaction::new(Arc::clone(&self.context), query, effect)?;

        self.reactions
            .lock()
            .insert(reaction.subscriber_id(), Arc::clone(&reaction));

        Ok(Disposer {
            reaction,
            registry: Arc::downgrade(&self.reactions),
        })
    }

    /// Run `body` in a mutation scope; the only legal way to write to a
    /// watched container.
    pub fn scoped_mutate<R, F>(&self, body: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        run_scoped(&self.context, body)
    }

    /// Package `body` as a reusable action.
    ///
    /// Every call of the returned closure runs `body` in its own mutation
    /// scope.
    pub fn action<F>(&self, body: F) -> impl Fn() -> Result<()> + Send + Sync + 'static
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let context = Arc::clone(&self.context);
        move || run_scoped(&context, &body)
    }

    /// Number of reactions that have not been disposed.
    pub fn reaction_count(&self) -> usize {
        self.reactions.lock().len()
    }

    /// Check if a read scope is open.
    pub fn is_tracking_reads(&self) -> bool {
        self.context.is_tracking_reads()
    }

    /// Check if a write scope is open.
    pub fn is_tracking_writes(&self) -> bool {
        self.context.is_tracking_writes()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("context", &self.context)
            .field("reaction_count", &self.reaction_count())
            .finish()
    }
}
