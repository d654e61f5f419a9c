//! Tracking Context
//!
//! The tracking context records which watched containers are read and
//! written while a scope is open. Reactions open a read scope around their
//! query; mutation scopes open a write scope around their body.
//!
//! # Implementation
//!
//! The context holds two independent slots. Each slot is either empty or
//! holds the list of containers recorded since it was opened. Only one scope
//! of each kind may be open at a time: opening a second one is an error
//! rather than a nested push, and closing an empty slot is an error too.
//!
//! A context is an ordinary value owned by a [`Runtime`](super::Runtime) and
//! shared by everything that runtime creates. The begin operations return
//! guards that close their slot when dropped, so an early return or a panic
//! inside user code never leaves a scope open.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::watched::{ContainerId, Watchable};
use crate::error::{ReactiveError, Result};

/// Containers recorded by an open scope, in access order, duplicates kept.
pub type TrackedList = SmallVec<[Arc<Watchable>; 4]>;

/// Distinct containers recorded by a closed read scope.
pub type DependencySet = IndexMap<ContainerId, Arc<Watchable>>;

/// Collapse a tracked list into its distinct containers.
pub(crate) fn distinct(list: TrackedList) -> DependencySet {
    list.into_iter().map(|node| (node.id(), node)).collect()
}

/// An open scope: a token identifying who opened it plus what it recorded.
struct OpenScope {
    token: u64,
    recorded: TrackedList,
}

/// Read and write tracking slots.
pub struct TrackingContext {
    reads: Mutex<Option<OpenScope>>,
    writes: Mutex<Option<OpenScope>>,
    next_token: AtomicU64,
}

impl TrackingContext {
    /// Create a context with no scope open.
    pub fn new() -> Self {
        Self {
            reads: Mutex::new(None),
            writes: Mutex::new(None),
            next_token: AtomicU64::new(0),
        }
    }

    fn open(&self, slot: &Mutex<Option<OpenScope>>) -> Option<u64> {
        let mut slot = slot.lock();
        if slot.is_some() {
            return None;
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        *slot = Some(OpenScope {
            token,
            recorded: SmallVec::new(),
        });
        Some(token)
    }

    /// Open a read scope.
    ///
    /// The scope closes when [`ReadScope::finish`] is called or the guard is
    /// dropped, whichever happens first.
    pub fn begin_read(&self) -> Result<ReadScope<'_>> {
        let token = self
            .open(&self.reads)
            .ok_or(ReactiveError::AlreadyTrackingReads)?;
        tracing::trace!("read scope opened");
        Ok(ReadScope {
            context: self,
            token,
            finished: false,
        })
    }

    /// Close the open read scope and return the distinct containers it read.
    pub fn end_read(&self) -> Result<DependencySet> {
        let scope = self
            .reads
            .lock()
            .take()
            .ok_or(ReactiveError::NotTrackingReads)?;
        let read = distinct(scope.recorded);
        tracing::trace!(containers = read.len(), "read scope closed");
        Ok(read)
    }

    /// Open a write scope.
    pub fn begin_write(&self) -> Result<WriteScope<'_>> {
        let token = self
            .open(&self.writes)
            .ok_or(ReactiveError::AlreadyTrackingWrites)?;
        tracing::trace!("write scope opened");
        Ok(WriteScope {
            context: self,
            token,
            finished: false,
        })
    }

    /// Close the open write scope and return every container it wrote.
    ///
    /// A container written several times appears several times.
    pub fn end_write(&self) -> Result<TrackedList> {
        let scope = self
            .writes
            .lock()
            .take()
            .ok_or(ReactiveError::NotTrackingWrites)?;
        tracing::trace!(writes = scope.recorded.len(), "write scope closed");
        Ok(scope.recorded)
    }

    /// Record a read of `container`. Does nothing when no read scope is open.
    pub fn record_read(&self, container: &Arc<Watchable>) {
        if let Some(scope) = self.reads.lock().as_mut() {
            scope.recorded.push(Arc::clone(container));
        }
    }

    /// Record a write to `container`.
    ///
    /// Fails with [`ReactiveError::WriteOutsideScope`] when no write scope is
    /// open; the caller must not perform the write in that case.
    pub fn record_write(&self, container: &Arc<Watchable>) -> Result<()> {
        match self.writes.lock().as_mut() {
            Some(scope) => {
                scope.recorded.push(Arc::clone(container));
                Ok(())
            }
            None => Err(ReactiveError::WriteOutsideScope {
                container: container.id(),
            }),
        }
    }

    /// Check if a read scope is open.
    pub fn is_tracking_reads(&self) -> bool {
        self.reads.lock().is_some()
    }

    /// Check if a write scope is open.
    pub fn is_tracking_writes(&self) -> bool {
        self.writes.lock().is_some()
    }

    /// Drop the slot's scope if it is still the one identified by `token`.
    fn abandon(slot: &Mutex<Option<OpenScope>>, token: u64) -> bool {
        let mut slot = slot.lock();
        if slot.as_ref().map(|scope| scope.token) == Some(token) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

impl Default for TrackingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TrackingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingContext")
            .field("tracking_reads", &self.is_tracking_reads())
            .field("tracking_writes", &self.is_tracking_writes())
            .finish()
    }
}

/// Guard for an open read scope.
#[must_use = "dropping a read scope closes it and discards what it recorded"]
pub struct ReadScope<'a> {
    context: &'a TrackingContext,
    token: u64,
    finished: bool,
}

impl ReadScope<'_> {
    /// Close the scope and return the distinct containers read.
    pub fn finish(mut self) -> Result<DependencySet> {
        self.finished = true;
        self.context.end_read()
    }
}

impl Drop for ReadScope<'_> {
    fn drop(&mut self) {
        if !self.finished && TrackingContext::abandon(&self.context.reads, self.token) {
            tracing::trace!("read scope abandoned");
        }
    }
}

/// Guard for an open write scope.
#[must_use = "dropping a write scope closes it and discards what it recorded"]
pub struct WriteScope<'a> {
    context: &'a TrackingContext,
    token: u64,
    finished: bool,
}

impl WriteScope<'_> {
    /// Close the scope and return every container written.
    pub fn finish(mut self) -> Result<TrackedList> {
        self.finished = true;
        self.context.end_write()
    }
}

impl Drop for WriteScope<'_> {
    fn drop(&mut self) {
        if !self.finished && TrackingContext::abandon(&self.context.writes, self.token) {
            tracing::trace!("write scope abandoned");
        }
    }
}
