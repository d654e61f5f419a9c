//! Reactive Primitives
//!
//! This module implements the dependency-tracking engine: watched
//! containers, reactions and mutation scopes, tied together by a tracking
//! context.
//!
//! # Concepts
//!
//! ## Watched Containers
//!
//! A [`Watched`] wraps a plain record. Reading it inside a tracking scope
//! registers the container as a dependency of whatever is being evaluated.
//! Writing it is only allowed inside a mutation scope.
//!
//! ## Reactions
//!
//! A [`Reaction`] pairs a query with an effect. The query's reads decide
//! which containers the reaction listens to; the effect runs whenever the
//! query's result changes. Dependencies are rediscovered on every run, so a
//! query that branches only listens to the branch it took.
//!
//! ## Mutation Scopes
//!
//! Writes are batched: notification happens once the scope's body has
//! finished, and a reaction that depends on several written containers runs
//! once.
//!
//! # Implementation Notes
//!
//! There is no hidden global state. Each [`Runtime`] owns a
//! [`TrackingContext`] and passes it to the containers and reactions it
//! creates. Within one context at most one read scope and one write scope may
//! be open at a time; nesting either kind is reported as an error.

mod context;
mod mutation;
mod reaction;
mod runtime;
mod subscriber;
mod watched;

pub use context::{DependencySet, ReadScope, TrackedList, TrackingContext, WriteScope};
pub use mutation::run_scoped;
pub use reaction::{Reaction, ReactionState};
pub use runtime::{Disposer, Runtime};
pub use subscriber::{Reactive, SubscriberId};
pub use watched::{ContainerId, Watchable, Watched};
