//! Moby Core
//!
//! This crate provides a minimal fine-grained reactive runtime. It
//! implements:
//!
//! - Watched containers that record which computations read them
//! - Reactions that discover their dependencies while they run
//! - Mutation scopes that batch change notification
//!
//! Writes to watched data are only legal inside a mutation scope. A write
//! anywhere else fails with [`ReactiveError::WriteOutsideScope`], so every
//! change is explicit and attributable.
//!
//! # Example
//!
//! ```rust
//! use moby_core::reactive::Runtime;
//!
//! struct State {
//!     counter: i32,
//!     name: String,
//! }
//!
//! let runtime = Runtime::new();
//! let state = runtime.watch(State { counter: 0, name: "bobbo".into() });
//!
//! let reader = state.clone();
//! let disposer = runtime
//!     .monitor(move || reader.get(|s| &s.counter), |counter| {
//!         println!("counter is now {counter}");
//!     })
//!     .unwrap();
//!
//! // Prints "counter is now 1"
//! runtime.scoped_mutate(|| state.write(|s| s.counter += 1)).unwrap();
//!
//! // The reaction never read `name`, so nothing is printed
//! runtime.scoped_mutate(|| state.set(|s| &mut s.name, "x".into())).unwrap();
//!
//! // Writing outside a mutation scope is refused
//! assert!(state.write(|s| s.counter = 5).is_err());
//!
//! disposer.dispose();
//! ```

pub mod error;
pub mod reactive;

pub use error::{ReactiveError, Result};
pub use reactive::{Disposer, Runtime, Watched};
