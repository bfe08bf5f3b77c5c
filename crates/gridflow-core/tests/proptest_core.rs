//! Property-based tests for the flow animation engine.
//!
//! Uses proptest to generate weights, rates, frame sequences and solver
//! readings, then verify the long-run and structural invariants hold.

use gridflow_core::accumulator::{EmissionAccumulator, RateAccumulator};
use gridflow_core::arbiter::Arbiter;
use gridflow_core::engine::FlowEngine;
use gridflow_core::snapshot::LightState;
use gridflow_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_weights() -> impl Strategy<Value = [f64; 3]> {
    (0.1..10.0f64, 0.1..10.0f64, 0.1..10.0f64).prop_map(|(a, b, c)| [a, b, c])
}

/// Solver values including the garbage a live solver can produce.
fn arb_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -2.0..5.0f64,
        1 => Just(0.0),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
    ]
}

#[derive(Debug, Clone)]
struct Frame {
    trunk: Option<f64>,
    load: Option<f64>,
    dt: f64,
}

fn arb_frames(max: usize) -> impl Strategy<Value = Vec<Frame>> {
    proptest::collection::vec(
        (
            proptest::option::of(arb_value()),
            proptest::option::of(arb_value()),
            prop_oneof![Just(0.0), 0.0..0.2f64],
        )
            .prop_map(|(trunk, load, dt)| Frame { trunk, load, dt }),
        1..=max,
    )
}

// ===========================================================================
// Arbiter
// ===========================================================================

proptest! {
    #[test]
    fn arbiter_share_converges(weights in arb_weights()) {
        let mut arb = Arbiter::new(3);
        let n = 1_000;
        let mut counts = [0usize; 3];
        for _ in 0..n {
            counts[arb.choose(&weights)] += 1;
        }
        let total: f64 = weights.iter().sum();
        for i in 0..3 {
            let expected = weights[i] / total * n as f64;
            prop_assert!(
                (counts[i] as f64 - expected).abs() <= 3.0,
                "path {} won {} times, expected {:.1}", i, counts[i], expected
            );
        }
    }

    #[test]
    fn arbiter_never_picks_zero_weight(a in 0.1..10.0f64, b in 0.1..10.0f64, zero in 0usize..3) {
        let mut weights = [a, b, a + b];
        weights[zero] = 0.0;
        let mut arb = Arbiter::new(3);
        for _ in 0..200 {
            prop_assert_ne!(arb.choose(&weights), zero);
        }
    }
}

// ===========================================================================
// Rate accumulator
// ===========================================================================

proptest! {
    #[test]
    fn accumulator_rate_independent_of_chopping(
        rate in 0.0..200.0f64,
        gain in 0.5..3.0f64,
        chops in 1u32..20,
    ) {
        let seconds = 50;
        let mut coarse = RateAccumulator::new(gain);
        let mut fine = RateAccumulator::new(gain);
        let mut coarse_n = 0u64;
        let mut fine_n = 0u64;
        let dt = 1.0 / f64::from(chops);
        for _ in 0..seconds {
            coarse_n += u64::from(coarse.advance(rate, 1.0));
            for _ in 0..chops {
                fine_n += u64::from(fine.advance(rate, dt));
            }
        }
        let expected = rate * gain * f64::from(seconds);
        prop_assert!((coarse_n as f64 - expected).abs() <= 1.0 + 1e-6);
        prop_assert!((fine_n as f64 - expected).abs() <= 1.0 + 1e-6);
    }

    #[test]
    fn tenths_match_one_whole_second(rate in 0.0..1000.0f64) {
        let mut coarse = RateAccumulator::new(1.0);
        let mut fine = RateAccumulator::new(1.0);
        let fine_n: u32 = (0..10).map(|_| fine.advance(rate, 0.1)).sum();
        prop_assert_eq!(coarse.advance(rate, 1.0), fine_n);
    }

    #[test]
    fn typed_emissions_track_ratio(
        total in 0.1..4.0f64,
        fraction in 0.0..1.0f64,
        gain in 0.5..3.0f64,
    ) {
        let mut acc = EmissionAccumulator::new(gain);
        let mut base = 0u64;
        let mut qualifying = 0u64;
        let frames = 60 * 30;
        for _ in 0..frames {
            let e = acc.advance(total, total * fraction, 1.0 / 60.0);
            base += u64::from(e.base);
            qualifying += u64::from(e.qualifying);
        }
        let seconds = frames as f64 / 60.0;
        let expected_total = total * gain * seconds;
        let expected_qualifying = total * fraction * gain * seconds;
        prop_assert!(((base + qualifying) as f64 - expected_total).abs() <= 1.0 + 1e-6);
        prop_assert!((qualifying as f64 - expected_qualifying).abs() <= 3.0);
    }
}

// ===========================================================================
// Engine
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn engine_survives_arbitrary_readings(frames in arb_frames(80)) {
        let mut engine = FlowEngine::new(fan_out_topology(3), test_config()).unwrap();
        let points = engine.topology().points().to_vec();
        for frame in &frames {
            let mut r = reading(&[]);
            if let Some(v) = frame.trunk {
                r = r.with("trunk", v);
            }
            if let Some(v) = frame.load {
                r = r.with("load", v);
            }
            engine.apply_reading(&r);
            engine.step(frame.dt);

            let snap = engine.snapshot();
            prop_assert_eq!(snap.len(), points.len());
            for view in engine.tokens() {
                prop_assert!(points.contains(&view.from));
                prop_assert!(points.contains(&view.to));
                prop_assert!((0.0..=1.0).contains(&view.progress));
                prop_assert!(view.opacity > 0.0 && view.opacity <= 1.0);
                if !view.fading {
                    prop_assert!(snap.state(view.to) != LightState::Off);
                }
            }
        }
    }
}
