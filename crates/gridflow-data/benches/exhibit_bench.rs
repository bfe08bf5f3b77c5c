//! Criterion benchmark for a full exhibit frame: reading applied, tokens
//! spawned, moved and arbitrated, snapshot published.

use criterion::{Criterion, criterion_group, criterion_main};
use gridflow_core::config::EngineConfig;
use gridflow_core::engine::FlowEngine;
use gridflow_core::test_utils::reading;
use gridflow_data::exhibit_engine;

const FRAME: f64 = 1.0 / 60.0;

/// Every feeder busy, wind on, load 1 generating.
fn busy_engine() -> FlowEngine {
    let mut engine = exhibit_engine(EngineConfig::default()).expect("exhibit wiring is valid");
    engine.apply_reading(
        &reading(&[
            ("trA", 3.0),
            ("trB", 1.0),
            ("trC", 2.0),
            ("trD", 1.0),
            ("trE", 1.0),
            ("trF", 0.8),
            ("trG", 0.6),
            ("trH", 0.5),
            ("trI", 0.4),
            ("trJ", 0.6),
            ("trK", 0.8),
            ("trL", 0.6),
            ("trM", 2.0),
            ("Load1", -0.5),
            ("Load2", 1.0),
            ("Load3", 1.0),
            ("Load4", 1.0),
            ("Load5", 1.0),
            ("Load6", 1.0),
            ("PowPlant", 4.0),
            ("WindTurbines", 2.0),
        ])
        .with_capacity(6.0)
        .with_renewable(2.0),
    );
    // Warm up so the board is populated.
    for _ in 0..300 {
        engine.step(FRAME);
    }
    engine
}

fn bench_exhibit(c: &mut Criterion) {
    let mut group = c.benchmark_group("exhibit");

    group.bench_function("frame", |b| {
        let mut engine = busy_engine();
        b.iter(|| engine.step(FRAME));
    });

    group.bench_function("frame_and_signal", |b| {
        let mut engine = busy_engine();
        b.iter(|| {
            engine.step(FRAME);
            engine.snapshot().signal_string()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_exhibit);
criterion_main!(benches);
