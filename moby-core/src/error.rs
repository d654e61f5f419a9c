//! Error types for the reactive engine.
//!
//! Every failure the engine can produce is a programmer error surfaced
//! synchronously to the caller of the offending operation. Nothing here is
//! retried or recovered from inside the engine.

use thiserror::Error;

use crate::reactive::ContainerId;

/// Errors raised by tracking scopes and watched containers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// A read scope was opened while another one was still open.
    #[error("already tracking reads")]
    AlreadyTrackingReads,

    /// A read scope was closed but none was open.
    #[error("not currently tracking reads")]
    NotTrackingReads,

    /// A write scope was opened while another one was still open.
    #[error("already tracking writes")]
    AlreadyTrackingWrites,

    /// A write scope was closed but none was open.
    #[error("not currently tracking writes")]
    NotTrackingWrites,

    /// A watched container was written outside of a mutation scope.
    #[error("watched container {container:?} modified outside of a mutation scope")]
    WriteOutsideScope { container: ContainerId },

    /// A watched container was accessed while a conflicting borrow of it was
    /// still live further up the stack.
    #[error("watched container {container:?} is already borrowed")]
    ContainerBusy { container: ContainerId },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
