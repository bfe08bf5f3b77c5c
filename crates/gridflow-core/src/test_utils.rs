//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::EngineConfig;
use crate::engine::FlowEngine;
use crate::reading::SolverReading;
use crate::topology::{End, JunctionKind, Topology};
use crate::wiring::*;

// ===========================================================================
// Config
// ===========================================================================

/// Unit gain and speed, no jitter: one emission and one span per flow unit
/// per second.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        emission_gain: 1.0,
        flow_speed: 1.0,
        jitter: 0.0,
        fade_duration: 0.5,
        seed: 1,
        ..Default::default()
    }
}

pub fn reading(channels: &[(&str, f64)]) -> SolverReading {
    channels
        .iter()
        .fold(SolverReading::new(), |r, &(name, value)| r.with(name, value))
}

// ===========================================================================
// Wiring builders
// ===========================================================================

pub fn segment(name: &str, points: Vec<u32>, channel: &str, share: f64) -> SegmentSpec {
    SegmentSpec {
        name: name.into(),
        points,
        flow: FlowBinding {
            channel: channel.into(),
            share,
            per_capacity: false,
        },
        scale: 1.0,
    }
}

pub fn endpoint(segment: &str, end: End) -> PathSpec {
    PathSpec {
        segment: segment.into(),
        end,
    }
}

pub fn rule(segment: &str, end: End, rule: RuleSpec) -> BoundarySpec {
    BoundarySpec {
        segment: segment.into(),
        end,
        rule,
    }
}

/// One segment `line` over points `0..n`, fed by channel `tr0` from a
/// boundary source at its head. The tail fades; the head has no rule, so
/// a token travelling backward is dropped there.
pub fn line_wiring(n: u32) -> WiringDescription {
    WiringDescription {
        point_ranges: vec![PointRange {
            first: 0,
            last: n.saturating_sub(1),
        }],
        segments: vec![segment("line", (0..n).collect(), "tr0", 1.0)],
        boundaries: vec![rule("line", End::Tail, RuleSpec::Fade)],
        sources: vec![SourceSpec::Boundary {
            segment: "line".into(),
        }],
        ..Default::default()
    }
}

pub fn line_topology(n: u32) -> Topology {
    Topology::build(&line_wiring(n)).expect("line wiring is valid")
}

pub fn line_engine(n: u32) -> FlowEngine {
    FlowEngine::new(line_topology(n), test_config()).expect("test config is valid")
}

/// A three-point `trunk` (points 0..=2) fanning out at junction `J` into
/// `branches` (2 or 3) three-point branches `b1`.. (points 10..=12,
/// 20..=22, ..), each carrying an equal share of channel `trunk`.
///
/// Branch tails fade; branch heads pass back onto the trunk tail. Junction
/// `GEN` spans the branch tails and feeds a local generation source driven
/// by load channel `load`.
pub fn fan_out_wiring(branches: u32) -> WiringDescription {
    let names: Vec<String> = (1..=branches).map(|i| format!("b{i}")).collect();
    let share = 1.0 / f64::from(branches.max(1));

    let mut desc = WiringDescription {
        point_ranges: vec![PointRange { first: 0, last: 2 }],
        segments: vec![segment("trunk", vec![0, 1, 2], "trunk", 1.0)],
        junctions: vec![
            JunctionSpec {
                name: "J".into(),
                kind: JunctionKind::Network,
                symmetric: false,
                paths: names.iter().map(|n| endpoint(n, End::Head)).collect(),
                feeders: vec![endpoint("trunk", End::Tail)],
            },
            JunctionSpec {
                name: "GEN".into(),
                kind: JunctionKind::Generation,
                symmetric: true,
                paths: names.iter().map(|n| endpoint(n, End::Tail)).collect(),
                feeders: vec![],
            },
        ],
        boundaries: vec![
            rule("trunk", End::Head, RuleSpec::Fade),
            rule(
                "trunk",
                End::Tail,
                RuleSpec::Branch {
                    junction: "J".into(),
                    candidates: (0..names.len())
                        .map(|path| CandidateSpec {
                            path,
                            weight: WeightSpec::SegmentFlow,
                        })
                        .collect(),
                },
            ),
        ],
        sources: vec![
            SourceSpec::Boundary {
                segment: "trunk".into(),
            },
            SourceSpec::LocalGeneration {
                load: "load".into(),
                flow: "trunk".into(),
                junction: "GEN".into(),
            },
        ],
        ..Default::default()
    };

    for (i, name) in names.iter().enumerate() {
        let base = 10 * (i as u32 + 1);
        desc.point_ranges.push(PointRange {
            first: base,
            last: base + 2,
        });
        desc.segments
            .push(segment(name, vec![base, base + 1, base + 2], "trunk", share));
        desc.boundaries.push(rule(name, End::Tail, RuleSpec::Fade));
        desc.boundaries.push(rule(
            name,
            End::Head,
            RuleSpec::PassThrough {
                segment: "trunk".into(),
                end: End::Tail,
            },
        ));
    }
    desc
}

pub fn fan_out_topology(branches: u32) -> Topology {
    Topology::build(&fan_out_wiring(branches)).expect("fan-out wiring is valid")
}
