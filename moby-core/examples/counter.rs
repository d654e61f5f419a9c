//! Counter demo
//!
//! Two reactions watch one piece of state: one follows `counter`, the other
//! follows `name`. Each button press is an action that runs in its own
//! mutation scope.
//!
//! Run with `RUST_LOG=moby_core=debug cargo run --example counter` to see
//! the engine's tracing output.

use moby_core::{Result, Runtime};
use tracing_subscriber::EnvFilter;

struct State {
    counter: i32,
    name: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = Runtime::new();
    let state = runtime.watch(State {
        counter: 0,
        name: "bobbo".to_string(),
    });

    let query_state = state.clone();
    let effect_state = state.clone();
    let counter_monitor = runtime.monitor(
        move || {
            tracing::info!("counter monitor is running");
            query_state.get(|s| &s.counter)
        },
        move |counter| {
            println!("counter is now {counter}");
            // Untracked: the effect is not part of the dependency set anyway.
            println!("{}", effect_state.read_untracked(|s| s.name.clone()));
        },
    )?;

    let query_state = state.clone();
    let name_monitor = runtime.monitor(
        move || {
            tracing::info!("name monitor is running");
            query_state.get(|s| &s.name)
        },
        |name| println!("name is now {name}"),
    )?;

    let writer = state.clone();
    let increment = runtime.action(move || writer.write(|s| s.counter += 1));

    let writer = state.clone();
    let rename = runtime.action(move || {
        writer.write(|s| s.name = format!("{}!", s.name))
    });

    increment()?;
    increment()?;
    rename()?;

    if let Err(err) = state.write(|s| s.counter = 100) {
        println!("refused: {err}");
    }

    counter_monitor.dispose();
    name_monitor.dispose();

    // Nobody is listening any more.
    increment()?;

    Ok(())
}
