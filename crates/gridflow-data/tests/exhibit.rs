//! Scripted runs over the bundled exhibit wiring.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;

use gridflow_core::config::EngineConfig;
use gridflow_core::driver::StepDriver;
use gridflow_core::engine::FlowEngine;
use gridflow_core::id::PointId;
use gridflow_core::reading::SolverReading;
use gridflow_core::snapshot::{FlowSnapshot, LightState};
use gridflow_core::test_utils::reading;
use gridflow_core::token::TokenKind;
use gridflow_data::{EXHIBIT_POINT_COUNT, exhibit_engine, exhibit_wiring, load_dir};

const FRAME: f64 = 1.0 / 30.0;

fn engine() -> FlowEngine {
    exhibit_engine(EngineConfig::default()).unwrap()
}

fn lit(snapshot: &FlowSnapshot) -> Vec<(u32, LightState)> {
    snapshot
        .iter()
        .filter(|(_, s)| !s.is_off())
        .map(|(p, s)| (p.0, s))
        .collect()
}

/// Run `seconds` of frames under a fixed reading, collecting every lit point.
fn run(engine: &mut FlowEngine, r: &SolverReading, seconds: f64) -> Vec<(u32, LightState)> {
    engine.apply_reading(r);
    let mut seen = Vec::new();
    let frames = (seconds / FRAME).round() as usize;
    for _ in 0..frames {
        engine.step(FRAME);
        seen.extend(lit(&engine.snapshot()));
    }
    seen
}

#[test]
fn dark_before_any_reading() {
    let mut engine = engine();
    engine.step(FRAME);
    let snap = engine.snapshot();
    assert_eq!(snap.len(), EXHIBIT_POINT_COUNT);
    assert_eq!(snap.signal_string(), "0".repeat(EXHIBIT_POINT_COUNT));
}

#[test]
fn feed_a_flows_into_b_only() {
    let mut engine = engine();
    let seen = run(
        &mut engine,
        &reading(&[("trA", 2.0), ("trB", 2.0), ("Load1", 1.0)]),
        3.0,
    );

    assert!(!seen.is_empty());
    assert!(seen.iter().any(|&(p, _)| (1..=5).contains(&p)), "A never lit");
    assert!(seen.iter().any(|&(p, _)| (7..=10).contains(&p)), "B never lit");
    assert!(
        seen.iter().any(|&(p, _)| (11..=16).contains(&p)),
        "B fan-out never lit"
    );
    for &(p, _) in &seen {
        assert!(
            (1..=5).contains(&p) || (7..=16).contains(&p),
            "point {p} lit outside A and B"
        );
    }
}

#[test]
fn renewable_feed_is_qualifying() {
    let mut engine = engine();
    let seen = run(
        &mut engine,
        &reading(&[("PowPlant", 5.0)]).with_capacity(5.0),
        2.0,
    );

    assert!(!seen.is_empty());
    for &(p, state) in &seen {
        assert!((155..=167).contains(&p), "point {p} lit outside W");
        assert!(matches!(
            state,
            LightState::Lit {
                kind: TokenKind::Qualifying,
                ..
            }
        ));
    }
}

#[test]
fn local_generation_flows_back_up_the_fan_out() {
    let mut engine = engine();
    let seen = run(
        &mut engine,
        &reading(&[("trB", 1.0), ("Load1", -1.0)]),
        4.0,
    );

    assert!(seen.iter().any(|&(p, _)| (11..=16).contains(&p)));
    for &(p, state) in &seen {
        assert!((7..=16).contains(&p), "point {p} lit outside B");
        assert!(matches!(
            state,
            LightState::Lit {
                kind: TokenKind::Qualifying,
                ..
            }
        ));
    }
}

#[test]
fn flow_collapse_clears_the_board() {
    let mut engine = engine();
    let busy = reading(&[
        ("trA", 2.0),
        ("trB", 1.0),
        ("trC", 1.0),
        ("trE", 1.0),
        ("trG", 1.0),
        ("Load1", 1.0),
    ]);
    run(&mut engine, &busy, 3.0);
    assert!(engine.snapshot().lit_count() > 0);

    let zeros: Vec<(&str, f64)> = ["trA", "trB", "trC", "trE", "trG"]
        .into_iter()
        .map(|c| (c, 0.0))
        .collect();
    run(&mut engine, &reading(&zeros), 1.0);
    assert_eq!(engine.snapshot().lit_count(), 0);
    assert_eq!(engine.live_tokens(), 0);
}

#[test]
fn driver_replays_identically() {
    let script = |step: usize| {
        let load = if step % 60 < 30 { 1.0 } else { -0.5 };
        reading(&[
            ("trA", 2.0),
            ("trB", 1.5),
            ("trC", 1.0),
            ("trD", 0.5),
            ("trE", 0.5),
            ("Load1", load),
            ("Load2", 1.0),
            ("WindTurbines", 3.0),
        ])
        .with_capacity(6.0)
        .with_renewable(3.0)
    };
    let replay = || {
        let (tx, rx) = mpsc::channel::<SolverReading>();
        let mut driver = StepDriver::new(engine(), Box::new(rx));
        let mut frames = Vec::new();
        for step in 0..180 {
            tx.send(script(step)).unwrap();
            frames.push(driver.advance(FRAME).signal_string());
        }
        frames
    };
    let first = replay();
    assert_eq!(first, replay());
    assert!(first.iter().any(|s| s.contains(['5', '6', '7'])));
    assert!(first.iter().any(|s| s.contains(['2', '3', '4'])));
}

#[test]
fn json_copy_loads_like_the_bundled_wiring() {
    let dir: PathBuf = std::env::temp_dir().join(format!(
        "gridflow_exhibit_json_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    let json = serde_json::to_string_pretty(&exhibit_wiring().unwrap()).unwrap();
    fs::write(dir.join("wiring.json"), json).unwrap();

    let (topology, config) = load_dir(&dir).unwrap();
    assert_eq!(topology.points().len(), EXHIBIT_POINT_COUNT);
    assert!(topology.contains_point(PointId(177)));
    assert_eq!(topology.segments().len(), 32);
    assert_eq!(config, EngineConfig::default());

    let _ = fs::remove_dir_all(&dir);
}
