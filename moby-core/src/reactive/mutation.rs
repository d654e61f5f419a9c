//! Mutation Scopes
//!
//! A mutation scope is the only place where watched containers may be
//! written. Writes inside the scope are recorded but notify nobody; once the
//! body has returned, every reaction subscribed to any written container is
//! triggered exactly once.
//!
//! # Failure
//!
//! If the body returns an error or panics, the write scope is still released
//! and no reaction is triggered. Writes the body already applied stay
//! applied.

use std::sync::Arc;

use indexmap::IndexMap;

use super::context::{distinct, DependencySet, TrackingContext};
use super::subscriber::{Reactive, SubscriberId};
use crate::error::Result;

/// Run `body` inside a write scope, then notify affected reactions.
///
/// Fails with
/// [`ReactiveError::AlreadyTrackingWrites`](crate::ReactiveError::AlreadyTrackingWrites)
/// when called from inside another mutation body. The first error returned
/// by a triggered reaction stops the remaining notifications and is returned.
pub fn run_scoped<R, F>(context: &TrackingContext, body: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    let scope = context.begin_write()?;

    let output = match body() {
        Ok(output) => output,
        Err(err) => {
            drop(scope);
            tracing::warn!(error = %err, "mutation scope failed, notifications dropped");
            return Err(err);
        }
    };

    let written = distinct(scope.finish()?);
    let pending = pending_triggers(&written);

    tracing::debug!(
        written = written.len(),
        notified = pending.len(),
        "mutation scope finished"
    );

    for reactive in pending.values() {
        reactive.trigger()?;
    }

    Ok(output)
}

/// Union of the subscribers of every written container, one entry per
/// subscriber.
fn pending_triggers(written: &DependencySet) -> IndexMap<SubscriberId, Arc<dyn Reactive>> {
    let mut pending = IndexMap::new();
    for node in written.values() {
        for (id, reactive) in node.subscribers() {
            pending.entry(id).or_insert(reactive);
        }
    }
    pending
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
