//! Subscriber types for the reactive system.
//!
//! A subscriber is anything a watched container can notify when a mutation
//! scope wrote to it. In practice that is a [`Reaction`](super::Reaction),
//! but containers only see the [`Reactive`] trait object.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

/// Unique identifier for a subscriber.
///
/// Container subscriber sets are keyed by this ID, so subscribing the same
/// reaction twice counts once and a reaction that depends on several written
/// containers is triggered once per mutation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be re-run when one of its dependencies changes.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-evaluate after a mutation scope wrote to a dependency.
    ///
    /// Must be a no-op once the reactive value has been disposed.
    fn trigger(&self) -> Result<()>;

    /// Stop observing. Idempotent.
    fn dispose(&self);

    /// Whether [`dispose`](Reactive::dispose) has run.
    fn is_disposed(&self) -> bool;
}
