//! Reaction Implementation
//!
//! A Reaction pairs a query (a pure read of watched data) with an effect
//! (a side effect that runs when the query's result changes).
//!
//! # How Reactions Work
//!
//! 1. On creation the query runs inside a read scope. Its result becomes the
//!    baseline value and every container it read becomes a dependency.
//!
//! 2. When a mutation scope writes to a dependency, the reaction is
//!    triggered. It re-runs the query in a fresh read scope.
//!
//! 3. The new dependency set is diffed against the previous one: containers
//!    read for the first time get a subscription, containers no longer read
//!    lose theirs. A query that branches on watched data therefore only
//!    listens to the branch it actually took.
//!
//! 4. If the new result differs from the stored one the effect runs with it.
//!    The stored result is replaced either way.
//!
//! # Change Detection
//!
//! Results are compared with `PartialEq`, nothing deeper. Returning a shared
//! pointer whose target was mutated in place is not seen as a change.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::{DependencySet, TrackingContext};
use super::subscriber::{Reactive, SubscriberId};
use super::watched::ContainerId;
use crate::error::Result;

/// Lifecycle of a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionState {
    /// The baseline evaluation has not finished yet.
    Initializing,

    /// Subscribed and reacting to writes.
    Active,

    /// Unsubscribed for good. Triggers are ignored.
    Disposed,
}

/// A query/effect pair that re-runs when its tracked dependencies change.
///
/// # Type Parameters
///
/// - `T`: The query result. `PartialEq` decides whether the effect runs,
///   `Clone` lets the reaction keep a copy while handing one to the effect.
/// - `Q`: The query.
/// - `E`: The effect, called with each changed result.
pub struct Reaction<T, Q, E> {
    subscriber_id: SubscriberId,

    /// Handle to ourselves, handed to containers when subscribing.
    me: Weak<Self>,

    context: Arc<TrackingContext>,
    query: Q,
    effect: E,

    state: Mutex<ReactionState>,

    /// Result of the most recent query evaluation.
    value: Mutex<Option<T>>,

    /// Containers read during the most recent query evaluation.
    dependencies: Mutex<DependencySet>,

    effect_count: AtomicUsize,
}

impl<T, Q, E> Reaction<T, Q, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    Q: Fn() -> T + Send + Sync + 'static,
    E: Fn(T) + Send + Sync + 'static,
{
    /// Create a reaction and run its query once to establish a baseline.
    ///
    /// The effect does not run for the baseline. Errors raised while opening
    /// or closing the read scope propagate and leave no subscription behind.
    pub fn new(context: Arc<TrackingContext>, query: Q, effect: E) -> Result<Arc<Self>> {
        let reaction = Arc::new_cyclic(|me| Self {
            subscriber_id: SubscriberId::new(),
            me: me.clone(),
            context,
            query,
            effect,
            state: Mutex::new(ReactionState::Initializing),
            value: Mutex::new(None),
            dependencies: Mutex::new(DependencySet::new()),
            effect_count: AtomicUsize::new(0),
        });

        let (value, dependencies) = reaction.evaluate()?;

        let weak = reaction.weak();
        for node in dependencies.values() {
            node.subscribe(reaction.subscriber_id, weak.clone());
        }

        tracing::debug!(
            subscriber = reaction.subscriber_id.raw(),
            dependencies = dependencies.len(),
            "reaction created"
        );

        *reaction.value.lock() = Some(value);
        *reaction.dependencies.lock() = dependencies;
        *reaction.state.lock() = ReactionState::Active;

        Ok(reaction)
    }

    /// Run the query in a fresh read scope.
    fn evaluate(&self) -> Result<(T, DependencySet)> {
        let scope = self.context.begin_read()?;
        let value = (self.query)();
        let dependencies = scope.finish()?;
        Ok((value, dependencies))
    }

    fn weak(&self) -> Weak<dyn Reactive> {
        self.me.clone()
    }

    /// Swap in a new dependency set, subscribing and unsubscribing as needed.
    fn resubscribe(&self, next: DependencySet) {
        let mut current = self.dependencies.lock();
        let weak = self.weak();

        let mut added = 0;
        for (id, node) in &next {
            if !current.contains_key(id) {
                node.subscribe(self.subscriber_id, weak.clone());
                added += 1;
            }
        }

        let mut removed = 0;
        for (id, node) in current.iter() {
            if !next.contains_key(id) {
                node.unsubscribe(self.subscriber_id);
                removed += 1;
            }
        }

        if added > 0 || removed > 0 {
            tracing::debug!(
                subscriber = self.subscriber_id.raw(),
                added,
                removed,
                "reaction resubscribed"
            );
        }

        *current = next;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReactionState {
        *self.state.lock()
    }

    /// Result of the most recent query evaluation.
    pub fn value(&self) -> Option<T> {
        self.value.lock().clone()
    }

    /// Number of times the effect has run.
    pub fn effect_count(&self) -> usize {
        self.effect_count.load(Ordering::SeqCst)
    }

    /// Number of distinct containers the reaction currently depends on.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.lock().len()
    }

    /// Whether the reaction currently depends on the container `id`.
    pub fn depends_on(&self, id: ContainerId) -> bool {
        self.dependencies.lock().contains_key(&id)
    }
}

impl<T, Q, E> Reactive for Reaction<T, Q, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    Q: Fn() -> T + Send + Sync + 'static,
    E: Fn(T) + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn trigger(&self) -> Result<()> {
        if self.state() != ReactionState::Active {
            return Ok(());
        }

        let (value, next) = self.evaluate()?;

        // The query itself may have disposed us.
        if self.state() != ReactionState::Active {
            return Ok(());
        }

        self.resubscribe(next);

        let changed = {
            let mut stored = self.value.lock();
            if stored.as_ref() == Some(&value) {
                *stored = Some(value);
                None
            } else {
                *stored = Some(value.clone());
                Some(value)
            }
        };

        match changed {
            Some(value) => {
                self.effect_count.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(subscriber = self.subscriber_id.raw(), "running effect");
                (self.effect)(value);
            }
            None => {
                tracing::debug!(
                    subscriber = self.subscriber_id.raw(),
                    "value unchanged, effect skipped"
                );
            }
        }

        Ok(())
    }

    fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if *state == ReactionState::Disposed {
                return;
            }
            *state = ReactionState::Disposed;
        }

        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        for node in dependencies.values() {
            node.unsubscribe(self.subscriber_id);
        }

        tracing::debug!(
            subscriber = self.subscriber_id.raw(),
            released = dependencies.len(),
            "reaction disposed"
        );
    }

    fn is_disposed(&self) -> bool {
        self.state() == ReactionState::Disposed
    }
}

impl<T, Q, E> std::fmt::Debug for Reaction<T, Q, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaction")
            .field("subscriber_id", &self.subscriber_id)
            .field("state", &*self.state.lock())
            .field("dependency_count", &self.dependencies.lock().len())
            .field("effect_count", &self.effect_count.load(Ordering::SeqCst))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
