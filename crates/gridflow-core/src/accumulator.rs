//! Rate accumulators: leaky integrators that turn a continuous rate into a
//! stream of discrete emission events.
//!
//! Flow magnitudes change every frame, so a "spawn if rate > threshold" rule
//! would starve small flows. Instead each call adds `rate * dt * gain` to a
//! running level and emits one event per whole unit, carrying the fraction
//! forward. The long-run event rate is therefore `rate * gain` regardless of
//! how finely `dt` is chopped.

use serde::{Deserialize, Serialize};

/// Slack when testing for a whole unit. Ten charges of `0.1` sum to
/// `0.9999999999999999`, which must still count as one.
const WHOLE_EPS: f64 = 1e-9;

/// Whole units available in `level`, within [`WHOLE_EPS`].
fn whole_units(level: f64) -> f64 {
    (level + WHOLE_EPS).floor().max(0.0)
}

// ---------------------------------------------------------------------------
// Single-rate accumulator
// ---------------------------------------------------------------------------

/// Converts a continuous rate into whole emission events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateAccumulator {
    /// Fixed gain `K` applied to every charge.
    gain: f64,
    /// Fractional work carried between calls.
    level: f64,
}

impl RateAccumulator {
    /// Create an empty accumulator with gain `K`.
    pub fn new(gain: f64) -> Self {
        Self { gain, level: 0.0 }
    }

    /// Add `rate * dt * K` to the level without emitting.
    ///
    /// Non-finite or negative contributions are ignored. Nothing is ever
    /// discarded; the level only stops growing at `f64::MAX`.
    pub fn charge(&mut self, rate: f64, dt: f64) {
        let added = rate * dt * self.gain;
        if added.is_finite() && added > 0.0 {
            self.level = (self.level + added).min(f64::MAX);
        }
    }

    /// Whole units currently available.
    pub fn available(&self) -> u32 {
        whole_units(self.level).min(f64::from(u32::MAX)) as u32
    }

    /// Take up to `limit` whole units from the level. Returns how many were
    /// taken; the rest stays carried.
    pub fn take(&mut self, limit: u32) -> u32 {
        let n = self.available().min(limit);
        if n > 0 {
            self.level = (self.level - f64::from(n)).max(0.0);
        }
        n
    }

    /// Charge and drain in one call. Returns the number of emissions.
    pub fn advance(&mut self, rate: f64, dt: f64) -> u32 {
        self.charge(rate, dt);
        self.take(u32::MAX)
    }

    /// Current fractional level.
    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Drop any carried work.
    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

// ---------------------------------------------------------------------------
// Typed (two-rate) accumulator
// ---------------------------------------------------------------------------

/// Emissions from one [`EmissionAccumulator::advance`] call, split by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Emissions {
    /// Emissions tagged with the base (conventional) type.
    pub base: u32,
    /// Emissions tagged with the qualifying (renewable) type.
    pub qualifying: u32,
}

impl Emissions {
    pub fn total(&self) -> u32 {
        self.base + self.qualifying
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A pair of coupled accumulators: one for the total rate and one for the
/// qualifying share of it.
///
/// An emission is tagged qualifying only when both accumulators have a whole
/// unit available in the same step; otherwise it carries the base type. The
/// long-run type ratio therefore tracks the ratio of the two input rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionAccumulator {
    total: RateAccumulator,
    qualifying: RateAccumulator,
}

impl EmissionAccumulator {
    pub fn new(gain: f64) -> Self {
        Self {
            total: RateAccumulator::new(gain),
            qualifying: RateAccumulator::new(gain),
        }
    }

    /// Advance both accumulators by `dt` and drain everything available.
    ///
    /// `qualifying_rate` is clamped to `[0, total_rate]`.
    pub fn advance(&mut self, total_rate: f64, qualifying_rate: f64, dt: f64) -> Emissions {
        self.advance_limited(total_rate, qualifying_rate, dt, u32::MAX)
    }

    /// Like [`advance`](Self::advance), but emits at most `limit` events.
    /// Work beyond the limit stays in the levels for later calls.
    pub fn advance_limited(
        &mut self,
        total_rate: f64,
        qualifying_rate: f64,
        dt: f64,
        limit: u32,
    ) -> Emissions {
        let total_rate = if total_rate.is_finite() { total_rate.max(0.0) } else { 0.0 };
        let qualifying_rate = if qualifying_rate.is_finite() {
            qualifying_rate.clamp(0.0, total_rate)
        } else {
            0.0
        };

        self.total.charge(total_rate, dt);
        self.qualifying.charge(qualifying_rate, dt);

        // Each total unit is qualifying while a qualifying unit is also
        // available, base otherwise.
        let total = self.total.take(limit);
        let qualifying = self.qualifying.take(total);
        Emissions {
            base: total - qualifying,
            qualifying,
        }
    }

    /// Levels of the (total, qualifying) accumulators.
    pub fn levels(&self) -> (f64, f64) {
        (self.total.level(), self.qualifying.level())
    }

    pub fn reset(&mut self) {
        self.total.reset();
        self.qualifying.reset();
    }
}
