//! Headless exhibit: drives the diorama wiring with a scripted solver feed,
//! prints the LED signal line every half second, verifies determinism.
//!
//! Run with: `cargo run --package gridflow-data --example headless_exhibit [DATA_DIR]`
//!
//! With `DATA_DIR` the wiring (and optional engine config) is loaded from
//! that directory instead of the bundled exhibit. Set `RUST_LOG=debug` to see
//! engine events.

use std::path::Path;
use std::sync::mpsc;

use gridflow_core::driver::StepDriver;
use gridflow_core::engine::FlowEngine;
use gridflow_core::reading::SolverReading;
use gridflow_data::{exhibit_engine, load_engine};

const FPS: u32 = 30;
const SECONDS: u32 = 12;

/// A morning on the grid: demand ramps up, the wind picks up, and for a
/// while load 1 turns into local generation.
fn scripted_reading(frame: u32) -> SolverReading {
    let t = f64::from(frame) / f64::from(FPS);
    let demand = 1.0 + 0.5 * (t / 2.0).sin();
    let wind = (t / 4.0).min(2.0);
    let load1 = if (4.0..8.0).contains(&t) { -0.6 } else { 0.8 };

    SolverReading::new()
        .with("trA", 2.0 * demand)
        .with("trB", 0.8 * demand)
        .with("trC", 1.2 * demand)
        .with("trD", 0.5 * demand)
        .with("trE", 0.7 * demand)
        .with("trF", 0.4 * demand)
        .with("trG", 0.3 * demand)
        .with("trH", 0.3)
        .with("trI", 0.2)
        .with("trJ", 0.5)
        .with("trK", 0.6)
        .with("trL", 0.4)
        .with("trM", 1.0)
        .with("Load1", load1)
        .with("Load2", 0.5)
        .with("Load3", 0.4)
        .with("Load4", 0.3)
        .with("Load5", 0.5)
        .with("Load6", 0.4)
        .with("PowPlant", 3.0 * demand)
        .with("WindTurbines", wind)
        .with_capacity(5.0)
        .with_renewable(wind)
}

fn build_engine(dir: Option<&Path>) -> FlowEngine {
    let result = match dir {
        Some(dir) => load_engine(dir),
        None => exhibit_engine(Default::default()),
    };
    result.unwrap_or_else(|e| {
        eprintln!("failed to build engine: {e}");
        std::process::exit(1);
    })
}

fn run(dir: Option<&Path>, print: bool) -> Vec<String> {
    let (tx, rx) = mpsc::channel();
    let mut driver = StepDriver::new(build_engine(dir), Box::new(rx));
    let dt = 1.0 / f64::from(FPS);
    let mut lines = Vec::with_capacity((FPS * SECONDS) as usize);

    for frame in 0..FPS * SECONDS {
        // The solver publishes at a third of the frame rate.
        if frame % 3 == 0 {
            let _ = tx.send(scripted_reading(frame));
        }
        let snapshot = driver.advance(dt);
        let line = snapshot.signal_string();
        if print && frame % (FPS / 2) == 0 {
            println!(
                "[{:>5.1}s] lit={:>3} tokens={:>3} {line}",
                driver.elapsed(),
                snapshot.lit_count(),
                driver.engine().live_tokens(),
            );
        }
        lines.push(line);
    }
    lines
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dir = std::env::args().nth(1);
    let dir = dir.as_deref().map(Path::new);

    let first = run(dir, true);
    let second = run(dir, false);
    if first == second {
        println!("Determinism: PASS ({} frames match)", first.len());
    } else {
        let at = first.iter().zip(&second).position(|(a, b)| a != b);
        println!("Determinism: FAIL (first divergence at frame {at:?})");
        std::process::exit(1);
    }
}
