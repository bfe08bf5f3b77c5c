//! Junction arbitration: a multi-way proportional-share scheduler.
//!
//! Each junction owns one accumulator per path. On every call each
//! accumulator grows by its path's weight; the eligible path with the largest
//! accumulator wins and pays back the sum of all weights. Over many calls each
//! path wins in proportion to its share of the total weight, and any path
//! with a positive weight eventually wins.

use serde::{Deserialize, Serialize};

use crate::rng::SimRng;

/// Maximum number of paths a junction can arbitrate between.
pub const MAX_PATHS: usize = 3;

/// Per-junction arbitration state, persisted across steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arbiter {
    /// Number of paths in use (1..=MAX_PATHS).
    paths: usize,
    /// Running accumulator per path.
    accumulators: [f64; MAX_PATHS],
}

impl Arbiter {
    /// Create an arbiter for `paths` paths (clamped to `1..=MAX_PATHS`).
    pub fn new(paths: usize) -> Self {
        Self {
            paths: paths.clamp(1, MAX_PATHS),
            accumulators: [0.0; MAX_PATHS],
        }
    }

    pub fn paths(&self) -> usize {
        self.paths
    }

    /// Current accumulator values, one per path.
    pub fn accumulators(&self) -> &[f64] {
        &self.accumulators[..self.paths]
    }

    /// Pick the winning path for this call.
    ///
    /// Weights beyond the junction's path count are ignored; missing,
    /// negative or non-finite weights count as zero. A zero-weight path never
    /// wins unless every weight is zero, in which case path 0 wins. Ties go
    /// to the lower index.
    pub fn choose(&mut self, weights: &[f64]) -> usize {
        let mut w = [0.0; MAX_PATHS];
        for (slot, &raw) in w.iter_mut().zip(weights.iter()).take(self.paths) {
            *slot = if raw.is_finite() && raw > 0.0 { raw } else { 0.0 };
        }
        let total: f64 = w[..self.paths].iter().sum();

        for (acc, weight) in self.accumulators.iter_mut().zip(w.iter()).take(self.paths) {
            *acc += weight;
        }

        let mut winner: Option<usize> = None;
        for i in 0..self.paths {
            if w[i] <= 0.0 {
                continue;
            }
            match winner {
                Some(best) if self.accumulators[best] >= self.accumulators[i] => {}
                _ => winner = Some(i),
            }
        }

        let winner = winner.unwrap_or(0);
        self.accumulators[winner] -= total;
        winner
    }

    /// Like [`choose`](Self::choose), but scales each positive weight by
    /// `1 + jitter` with jitter drawn from `[0, bound)`.
    ///
    /// Symmetric fan-outs use this so equal weights do not always resolve in
    /// declaration order.
    pub fn choose_jittered(&mut self, weights: &[f64], rng: &mut SimRng, bound: f64) -> usize {
        let mut w = [0.0; MAX_PATHS];
        for (slot, &raw) in w.iter_mut().zip(weights.iter()).take(self.paths) {
            *slot = if raw.is_finite() && raw > 0.0 {
                raw * (1.0 + rng.jitter(bound))
            } else {
                0.0
            };
        }
        self.choose(&w[..self.paths])
    }

    /// Forget all accumulated history.
    pub fn reset(&mut self) {
        self.accumulators = [0.0; MAX_PATHS];
    }
}
