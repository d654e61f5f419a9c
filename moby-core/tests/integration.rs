//! Integration Tests for the Reactive Engine
//!
//! These tests drive watched containers, reactions and mutation scopes
//! together through the public runtime API.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use moby_core::reactive::{Runtime, Watched};
use moby_core::ReactiveError;

#[derive(Debug, Clone, PartialEq)]
struct Value {
    v: i32,
}

fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
    let count = Arc::new(AtomicI32::new(0));
    (count.clone(), count)
}

/// A reaction subscribes to the containers it read and nothing else.
#[test]
fn reaction_discovers_only_what_it_reads() {
    let runtime = Runtime::new();
    let watched = runtime.watch(Value { v: 0 });
    let unrelated = runtime.watch(Value { v: 0 });
    let (runs, runs_clone) = counter();

    let reader = watched.clone();
    let _disposer = runtime
        .monitor(move || reader.get(|w| &w.v), move |_| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(watched.subscriber_count(), 1);
    assert_eq!(unrelated.subscriber_count(), 0);

    runtime
        .scoped_mutate(|| unrelated.set(|w| &mut w.v, 1))
        .unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

/// Writes outside a mutation scope are refused; inside one they land.
#[test]
fn writes_require_a_mutation_scope() {
    let runtime = Runtime::new();
    let w = runtime.watch(Value { v: 0 });

    assert_eq!(
        w.set(|w| &mut w.v, 1),
        Err(ReactiveError::WriteOutsideScope { container: w.id() })
    );
    assert_eq!(w.get(|w| &w.v), 0);

    runtime.scoped_mutate(|| w.set(|w| &mut w.v, 1)).unwrap();
    assert_eq!(w.get(|w| &w.v), 1);
}

/// One scope writing two dependencies runs the effect once.
#[test]
fn notifications_are_batched_per_scope() {
    let runtime = Runtime::new();
    let a = runtime.watch(Value { v: 0 });
    let b = runtime.watch(Value { v: 0 });
    let (runs, runs_clone) = counter();

    let (ra, rb) = (a.clone(), b.clone());
    let _disposer = runtime
        .monitor(move || ra.get(|w| &w.v) + rb.get(|w| &w.v), move |_| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    runtime
        .scoped_mutate(|| {
            a.set(|w| &mut w.v, 1)?;
            b.set(|w| &mut w.v, 2)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// All writes in a scope complete before any effect observes them.
#[test]
fn effects_see_every_write_of_the_scope() {
    let runtime = Runtime::new();
    let a = runtime.watch(Value { v: 0 });
    let b = runtime.watch(Value { v: 0 });
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (ra, rb) = (a.clone(), b.clone());
    let seen_clone = seen.clone();
    let _disposer = runtime
        .monitor(
            move || (ra.get(|w| &w.v), rb.get(|w| &w.v)),
            move |pair| seen_clone.lock().push(pair),
        )
        .unwrap();

    runtime
        .scoped_mutate(|| {
            a.set(|w| &mut w.v, 1)?;
            b.set(|w| &mut w.v, 2)
        })
        .unwrap();

    assert_eq!(*seen.lock(), vec![(1, 2)]);
}

/// Dependencies follow the branch the query took on its latest run.
#[test]
fn dependencies_follow_the_active_branch() {
    let runtime = Runtime::new();
    let flag = runtime.watch(true);
    let a = runtime.watch(Value { v: 1 });
    let b = runtime.watch(Value { v: 2 });
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (rf, ra, rb) = (flag.clone(), a.clone(), b.clone());
    let seen_clone = seen.clone();
    let _disposer = runtime
        .monitor(
            move || {
                if rf.read(|f| *f) {
                    ra.get(|w| &w.v)
                } else {
                    rb.get(|w| &w.v)
                }
            },
            move |v| seen_clone.lock().push(v),
        )
        .unwrap();

    assert_eq!(flag.subscriber_count(), 1);
    assert_eq!(a.subscriber_count(), 1);
    assert_eq!(b.subscriber_count(), 0);

    runtime.scoped_mutate(|| flag.write(|f| *f = false)).unwrap();
    assert_eq!(*seen.lock(), vec![2]);
    assert_eq!(flag.subscriber_count(), 1);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(b.subscriber_count(), 1);

    // `a` is no longer read, so writing it alone must not re-run anything.
    runtime.scoped_mutate(|| a.set(|w| &mut w.v, 100)).unwrap();
    assert_eq!(*seen.lock(), vec![2]);

    runtime.scoped_mutate(|| b.set(|w| &mut w.v, 3)).unwrap();
    assert_eq!(*seen.lock(), vec![2, 3]);
}

/// After disposal no write re-runs the effect.
#[test]
fn disposed_reaction_stays_silent() {
    let runtime = Runtime::new();
    let a = runtime.watch(Value { v: 0 });
    let b = runtime.watch(Value { v: 0 });
    let (runs, runs_clone) = counter();

    let (ra, rb) = (a.clone(), b.clone());
    let disposer = runtime
        .monitor(move || ra.get(|w| &w.v) - rb.get(|w| &w.v), move |_| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    runtime.scoped_mutate(|| a.set(|w| &mut w.v, 1)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    disposer.dispose();
    disposer.dispose();

    runtime.scoped_mutate(|| a.set(|w| &mut w.v, 2)).unwrap();
    runtime.scoped_mutate(|| b.set(|w| &mut w.v, 2)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(b.subscriber_count(), 0);
    assert_eq!(runtime.reaction_count(), 0);
}

/// An unchanged result skips the effect but still updates dependencies.
#[test]
fn unchanged_result_skips_effect() {
    let runtime = Runtime::new();
    let flag = runtime.watch(true);
    let a = runtime.watch(Value { v: 7 });
    let b = runtime.watch(Value { v: 7 });
    let (runs, runs_clone) = counter();

    let (rf, ra, rb) = (flag.clone(), a.clone(), b.clone());
    let _disposer = runtime
        .monitor(
            move || {
                if rf.read(|f| *f) {
                    ra.get(|w| &w.v)
                } else {
                    rb.get(|w| &w.v)
                }
            },
            move |_| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

    // Both branches yield 7: no effect, but the reaction now listens to `b`.
    runtime.scoped_mutate(|| flag.write(|f| *f = false)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(b.subscriber_count(), 1);

    // Writing an equal value is not a change either.
    runtime.scoped_mutate(|| b.set(|w| &mut w.v, 7)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    runtime.scoped_mutate(|| b.set(|w| &mut w.v, 8)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Query results are compared with `PartialEq` only. A query that returns a
/// handle's identity does not notice the target being mutated in place.
#[test]
fn shallow_comparison_misses_in_place_mutation() {
    let runtime = Runtime::new();
    let shared = Arc::new(Mutex::new(1));
    let holder: Watched<Arc<Mutex<i32>>> = runtime.watch(Arc::clone(&shared));
    let (runs, runs_clone) = counter();

    let reader = holder.clone();
    let _disposer = runtime
        .monitor(
            move || reader.read(|inner| Arc::as_ptr(inner) as usize),
            move |_| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

    runtime
        .scoped_mutate(|| holder.write(|inner| *inner.lock() = 2))
        .unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(*shared.lock(), 2);
}

/// The counter/name walkthrough from the demo.
#[test]
fn counter_and_name_scenario() {
    #[derive(Debug)]
    struct State {
        counter: i32,
        name: String,
    }

    let runtime = Runtime::new();
    let state = runtime.watch(State {
        counter: 0,
        name: "bobbo".to_string(),
    });
    let seen = Arc::new(Mutex::new(Vec::new()));

    let reader = state.clone();
    let seen_clone = seen.clone();
    let _disposer = runtime
        .monitor(
            move || reader.get(|s| &s.counter),
            move |counter| seen_clone.lock().push(counter),
        )
        .unwrap();

    runtime
        .scoped_mutate(|| state.write(|s| s.counter += 1))
        .unwrap();
    assert_eq!(*seen.lock(), vec![1]);

    runtime
        .scoped_mutate(|| state.set(|s| &mut s.name, "x".to_string()))
        .unwrap();
    assert_eq!(*seen.lock(), vec![1]);
}

/// A failed mutation is unobserved and leaves the runtime usable.
#[test]
fn failed_mutation_is_unobserved() {
    let runtime = Runtime::new();
    let a = runtime.watch(Value { v: 0 });
    let outside = Runtime::new().watch(Value { v: 0 });
    let (runs, runs_clone) = counter();

    let reader = a.clone();
    let _disposer = runtime
        .monitor(move || reader.get(|w| &w.v), move |_| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    // `outside` belongs to another runtime, so its write is out of scope here.
    let result = runtime.scoped_mutate(|| {
        a.set(|w| &mut w.v, 1)?;
        outside.set(|w| &mut w.v, 1)
    });

    assert_eq!(
        result,
        Err(ReactiveError::WriteOutsideScope {
            container: outside.id()
        })
    );
    assert!(!runtime.is_tracking_writes());
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    runtime.scoped_mutate(|| a.set(|w| &mut w.v, 2)).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// An effect may start its own mutation scope once the outer one closed.
#[test]
fn effect_can_mutate() {
    let runtime = Runtime::new();
    let source = runtime.watch(Value { v: 0 });
    let mirror = runtime.watch(Value { v: 0 });

    let reader = source.clone();
    let effect_runtime = runtime.clone();
    let target = mirror.clone();
    let _copy = runtime
        .monitor(move || reader.get(|w| &w.v), move |v| {
            effect_runtime
                .scoped_mutate(|| target.set(|w| &mut w.v, v * 10))
                .unwrap();
        })
        .unwrap();

    let seen = Arc::new(AtomicI32::new(0));
    let mirror_reader = mirror.clone();
    let seen_clone = seen.clone();
    let _watch_mirror = runtime
        .monitor(move || mirror_reader.get(|w| &w.v), move |v| {
            seen_clone.store(v, Ordering::SeqCst);
        })
        .unwrap();

    runtime.scoped_mutate(|| source.set(|w| &mut w.v, 4)).unwrap();
    assert_eq!(mirror.get(|w| &w.v), 40);
    assert_eq!(seen.load(Ordering::SeqCst), 40);
}

/// Writing from inside a query is refused: queries only ever read.
#[test]
fn query_cannot_write() {
    let runtime = Runtime::new();
    let a = runtime.watch(Value { v: 0 });
    let error = Arc::new(Mutex::new(None::<ReactiveError>));

    let reader = a.clone();
    let error_clone = error.clone();
    let _disposer = runtime
        .monitor(
            move || {
                if let Err(err) = reader.set(|w| &mut w.v, 1) {
                    *error_clone.lock() = Some(err);
                }
                reader.get(|w| &w.v)
            },
            |_| {},
        )
        .unwrap();

    assert_eq!(
        *error.lock(),
        Some(ReactiveError::WriteOutsideScope { container: a.id() })
    );
    assert_eq!(a.get(|w| &w.v), 0);
}

/// A reaction disposed by another reaction's effect in the same fan-out
/// does not run.
#[test]
fn disposal_during_fan_out_is_respected() {
    let runtime = Runtime::new();
    let a = runtime.watch(Value { v: 0 });
    let (victim_runs, victim_clone) = counter();
    let slot: Arc<Mutex<Option<moby_core::Disposer>>> = Arc::new(Mutex::new(None));

    // Subscribed first, so it is triggered first.
    let reader = a.clone();
    let slot_clone = slot.clone();
    let _killer = runtime
        .monitor(move || reader.get(|w| &w.v), move |_| {
            if let Some(disposer) = slot_clone.lock().take() {
                disposer.dispose();
            }
        })
        .unwrap();

    let reader = a.clone();
    let victim = runtime
        .monitor(move || reader.get(|w| &w.v), move |_| {
            victim_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    *slot.lock() = Some(victim);

    runtime.scoped_mutate(|| a.set(|w| &mut w.v, 1)).unwrap();
    assert_eq!(victim_runs.load(Ordering::SeqCst), 0);
    assert_eq!(a.subscriber_count(), 1);
}

/// Reading a container from inside its own write closure reports the conflict
/// as an error instead of waiting on the record.
#[test]
fn fallible_read_inside_write_returns_busy() {
    let runtime = Runtime::new();
    let state = runtime.watch(Value { v: 0 });
    let (tx, rx) = mpsc::channel();

    let worker_runtime = runtime.clone();
    let worker_state = state.clone();
    thread::spawn(move || {
        let inner = worker_state.clone();
        let outcome = worker_runtime.scoped_mutate(|| {
            worker_state.write(|w| inner.try_get(|w| &w.v).map(|v| w.v = v + 1))
        });
        let _ = tx.send(outcome);
    });

    let outcome = rx
        .recv_timeout(Duration::from_secs(3))
        .expect("mutation returned");
    assert_eq!(
        outcome,
        Ok(Err(ReactiveError::ContainerBusy {
            container: state.id()
        }))
    );
    assert!(!runtime.is_tracking_writes());
    assert_eq!(state.get(|w| &w.v), 0);
}

/// The plain tracked read panics right away in the same situation, and the
/// runtime is usable afterwards.
#[test]
fn tracked_read_inside_write_panics_promptly() {
    let runtime = Runtime::new();
    let state = runtime.watch(Value { v: 0 });
    let (tx, rx) = mpsc::channel::<()>();

    let worker_runtime = runtime.clone();
    let worker_state = state.clone();
    let worker = thread::spawn(move || {
        let inner = worker_state.clone();
        let _ = worker_runtime
            .scoped_mutate(|| worker_state.write(|w| w.v = inner.get(|w| &w.v) + 1));
        let _ = tx.send(());
    });

    // The worker unwinds and drops the sender without sending.
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(3)),
        Err(RecvTimeoutError::Disconnected)
    );
    assert!(worker.join().is_err());

    assert!(!runtime.is_tracking_writes());
    runtime
        .scoped_mutate(|| state.write(|w| w.v += 1))
        .unwrap();
    assert_eq!(state.get(|w| &w.v), 1);
}
