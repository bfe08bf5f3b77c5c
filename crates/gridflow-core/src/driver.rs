//! Per-frame entry point.
//!
//! The [`StepDriver`] is called once per rendered frame. It polls its
//! [`ReadingSource`] without blocking, applies whatever reading is available,
//! scales the frame time, steps the engine and hands back the new snapshot.

use std::sync::Arc;

use tracing::warn;

use crate::engine::{FlowEngine, StepResult};
use crate::reading::ReadingSource;
use crate::snapshot::FlowSnapshot;
use crate::token::TokenView;

pub struct StepDriver {
    engine: FlowEngine,
    source: Box<dyn ReadingSource>,
    time_scale: f64,
    paused: bool,
    /// Simulated (scaled) seconds run so far.
    elapsed: f64,
    last: StepResult,
}

impl StepDriver {
    pub fn new(engine: FlowEngine, source: Box<dyn ReadingSource>) -> Self {
        let time_scale = engine.config().time_scale;
        Self {
            engine,
            source,
            time_scale,
            paused: false,
            elapsed: 0.0,
            last: StepResult::default(),
        }
    }

    /// Run one frame of `dt` wall seconds.
    ///
    /// If no reading is available the previous values are reused. While
    /// paused the step runs with `dt = 0`.
    pub fn advance(&mut self, dt: f64) -> Arc<FlowSnapshot> {
        if let Some(reading) = self.source.poll() {
            self.engine.apply_reading(&reading);
        }
        let scaled = if self.paused {
            0.0
        } else if dt.is_finite() && dt >= 0.0 {
            dt * self.time_scale
        } else {
            warn!(dt, "invalid frame time treated as zero");
            0.0
        };
        self.last = self.engine.step(scaled);
        self.elapsed += scaled;
        self.engine.snapshot()
    }

    /// Set the factor applied to every frame's `dt`. Negative or non-finite
    /// values are rejected and the previous scale kept.
    pub fn set_time_scale(&mut self, scale: f64) -> bool {
        if scale.is_finite() && scale >= 0.0 {
            self.time_scale = scale;
            true
        } else {
            warn!(scale, "rejected time scale");
            false
        }
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Swap the reading source, e.g. after the solver restarts.
    pub fn set_source(&mut self, source: Box<dyn ReadingSource>) {
        self.source = source;
    }

    pub fn snapshot(&self) -> Arc<FlowSnapshot> {
        self.engine.snapshot()
    }

    pub fn tokens(&self) -> Vec<TokenView> {
        self.engine.tokens()
    }

    pub fn step_count(&self) -> u64 {
        self.engine.step_count()
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Counts from the most recent frame.
    pub fn last_step(&self) -> StepResult {
        self.last
    }

    pub fn engine(&self) -> &FlowEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FlowEngine {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SegmentId;
    use crate::reading::{FixedReading, NoReading, SolverReading};
    use crate::test_utils::*;
    use std::sync::mpsc;

    #[test]
    fn pulls_reading_and_steps() {
        let source = FixedReading::new(reading(&[("tr0", 1.0)]));
        let mut driver = StepDriver::new(line_engine(3), Box::new(source));
        let snap = driver.advance(1.0);
        assert_eq!(snap.step(), 1);
        assert_eq!(driver.engine().live_tokens(), 1);
        assert_eq!(driver.last_step().spawned, 1);
    }

    #[test]
    fn reuses_previous_values_without_reading() {
        let source = FixedReading::new(reading(&[("tr0", 1.0)]));
        let mut driver = StepDriver::new(line_engine(3), Box::new(source));
        driver.advance(0.5);
        driver.advance(0.5);
        assert_eq!(driver.engine().segment_flow(SegmentId(0)), 1.0);
        assert_eq!(driver.engine().live_tokens(), 1);
    }

    #[test]
    fn first_frame_without_data() {
        let mut driver = StepDriver::new(line_engine(3), Box::new(NoReading));
        let snap = driver.advance(0.0);
        assert_eq!(snap.lit_count(), 0);
        assert_eq!(driver.step_count(), 1);
    }

    #[test]
    fn time_scale_and_pause() {
        let mut driver = StepDriver::new(line_engine(3), Box::new(NoReading));
        assert!(driver.set_time_scale(2.0));
        driver.advance(0.25);
        assert_eq!(driver.elapsed(), 0.5);

        assert!(!driver.set_time_scale(f64::NAN));
        assert!(!driver.set_time_scale(-1.0));
        assert_eq!(driver.time_scale(), 2.0);

        driver.set_paused(true);
        driver.advance(1.0);
        assert_eq!(driver.elapsed(), 0.5);
        assert_eq!(driver.step_count(), 2);
    }

    #[test]
    fn paused_driver_moves_nothing() {
        let source = FixedReading::new(reading(&[("tr0", 1.0)]));
        let mut driver = StepDriver::new(line_engine(4), Box::new(source));
        driver.advance(1.0);
        let before = driver.tokens();
        assert_eq!(before.len(), 1);
        driver.set_paused(true);
        driver.advance(0.5);
        assert_eq!(driver.tokens(), before);
    }

    #[test]
    fn channel_source() {
        let (tx, rx) = mpsc::channel::<SolverReading>();
        let mut driver = StepDriver::new(line_engine(3), Box::new(rx));
        tx.send(reading(&[("tr0", 0.5)])).unwrap();
        tx.send(reading(&[("tr0", 2.0)])).unwrap();
        driver.advance(0.0);
        assert_eq!(driver.engine().segment_flow(SegmentId(0)), 2.0);
    }
}
