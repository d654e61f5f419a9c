//! Watched Containers
//!
//! A [`Watched`] wraps a plain record and routes every access through the
//! tracking context:
//!
//! 1. A read registers the container with the open read scope (if any), then
//!    hands the record to the caller's projection.
//!
//! 2. A write first registers the container with the open write scope. With
//!    no write scope open the write is refused with
//!    [`ReactiveError::WriteOutsideScope`](crate::ReactiveError::WriteOutsideScope)
//!    and the record is left untouched.
//!
//! 3. Writes never notify anyone directly. The enclosing mutation scope
//!    notifies subscribers once it has finished.
//!
//! 4. A container's record cannot be written while it is borrowed. A write
//!    nested inside a read or write of the same container fails with
//!    [`ReactiveError::ContainerBusy`](crate::ReactiveError::ContainerBusy);
//!    a read nested inside a write panics (or errors, via
//!    [`Watched::try_read`]). Neither blocks.
//!
//! The subscriber bookkeeping lives in a separate [`Watchable`] node so that
//! tracking lists and dependency sets can refer to containers without knowing
//! the record type.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use super::context::TrackingContext;
use super::subscriber::{Reactive, SubscriberId};
use crate::error::{ReactiveError, Result};

/// Unique identifier for a watched container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    /// Generate a new unique container ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity and subscriber set of a watched container.
///
/// Subscribers are held weakly: a container never keeps a reaction alive.
pub struct Watchable {
    id: ContainerId,
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn Reactive>>>,
}

impl Watchable {
    /// Create a node with a fresh ID and no subscribers.
    pub fn new() -> Self {
        Self {
            id: ContainerId::new(),
            subscribers: Mutex::new(IndexMap::new()),
        }
    }

    /// Get the container's unique ID.
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Add a subscriber. Subscribing an ID that is already present is a no-op.
    pub(crate) fn subscribe(&self, id: SubscriberId, subscriber: Weak<dyn Reactive>) {
        self.subscribers.lock().entry(id).or_insert(subscriber);
    }

    /// Remove a subscriber. Removing an absent ID is a no-op.
    pub(crate) fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().shift_remove(&id);
    }

    /// Live subscribers, in subscription order.
    ///
    /// Entries whose reaction has been dropped are pruned on the way.
    pub(crate) fn subscribers(&self) -> Vec<(SubscriberId, Arc<dyn Reactive>)> {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|_, weak| weak.strong_count() > 0);
        subscribers
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|reactive| (*id, reactive)))
            .collect()
    }

    /// Number of subscribers currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether `id` is currently subscribed.
    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }
}

impl Default for Watchable {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Watchable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchable")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A record whose reads and writes are tracked.
///
/// # Example
///
/// ```rust,ignore
/// let state = runtime.watch(State { counter: 0 });
///
/// // Tracked read
/// let counter = state.get(|s| &s.counter);
///
/// // Writes are only legal inside a mutation scope
/// runtime.scoped_mutate(|| state.write(|s| s.counter += 1))?;
/// ```
///
/// Clones share the same record and the same subscriber set.
pub struct Watched<T> {
    record: Arc<RwLock<T>>,
    node: Arc<Watchable>,
    context: Arc<TrackingContext>,
}

impl<T> Watched<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap `record`, tracking accesses against `context`.
    pub fn new(context: Arc<TrackingContext>, record: T) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
            node: Arc::new(Watchable::new()),
            context,
        }
    }

    /// Get the container's unique ID.
    pub fn id(&self) -> ContainerId {
        self.node.id()
    }

    fn busy(&self) -> ReactiveError {
        ReactiveError::ContainerBusy {
            container: self.node.id(),
        }
    }

    /// Shared access to the record. Nested shared access is allowed.
    fn borrow(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.record.try_read_recursive()
    }

    fn borrow_or_panic(&self) -> RwLockReadGuard<'_, T> {
        match self.borrow() {
            Some(guard) => guard,
            None => panic!(
                "watched container {:?} read while it is being written",
                self.node.id()
            ),
        }
    }

    /// Tracked read through a projection.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a [`write`](Watched::write) closure of
    /// the same container. Use [`try_read`](Watched::try_read) to get an
    /// error instead.
    pub fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.context.record_read(&self.node);
        f(&self.borrow_or_panic())
    }

    /// Tracked read that fails with
    /// [`ReactiveError::ContainerBusy`] instead of panicking when the
    /// container is being written.
    pub fn try_read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.borrow().ok_or_else(|| self.busy())?;
        self.context.record_read(&self.node);
        Ok(f(&guard))
    }

    /// Tracked read of one field, cloned out of the record.
    ///
    /// # Panics
    ///
    /// Same as [`read`](Watched::read).
    pub fn get<V, F>(&self, field: F) -> V
    where
        V: Clone,
        F: FnOnce(&T) -> &V,
    {
        self.read(|record| field(record).clone())
    }

    /// Fallible form of [`get`](Watched::get).
    pub fn try_get<V, F>(&self, field: F) -> Result<V>
    where
        V: Clone,
        F: FnOnce(&T) -> &V,
    {
        self.try_read(|record| field(record).clone())
    }

    /// Read without registering a dependency.
    ///
    /// # Panics
    ///
    /// Same as [`read`](Watched::read).
    pub fn read_untracked<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.borrow_or_panic())
    }

    /// Tracked write. Only succeeds inside a mutation scope.
    ///
    /// Fails with [`ReactiveError::ContainerBusy`] when called while the same
    /// container is being read or written further up the stack; nothing is
    /// recorded in that case.
    pub fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.record.try_write().ok_or_else(|| self.busy())?;
        self.context.record_write(&self.node)?;
        Ok(f(&mut guard))
    }

    /// Tracked write of one field.
    pub fn set<V, F>(&self, field: F, value: V) -> Result<()>
    where
        F: FnOnce(&mut T) -> &mut V,
    {
        self.write(|record| *field(record) = value)
    }

    /// Number of reactions currently subscribed to this container.
    pub fn subscriber_count(&self) -> usize {
        self.node.subscriber_count()
    }
}

impl<T> Clone for Watched<T> {
    fn clone(&self) -> Self {
        Self {
            record: Arc::clone(&self.record),
            node: Arc::clone(&self.node),
            context: Arc::clone(&self.context),
        }
    }
}

impl<T> Debug for Watched<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Watched");
        debug.field("id", &self.node.id());
        match self.record.try_read_recursive() {
            Some(record) => debug.field("record", &*record),
            None => debug.field("record", &format_args!("<busy>")),
        };
        debug
            .field("subscriber_count", &self.node.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
