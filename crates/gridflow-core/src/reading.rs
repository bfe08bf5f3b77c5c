//! Solver readings and the sources they are pulled from.
//!
//! The engine never waits on the solver: each step it asks its
//! [`ReadingSource`] for whatever is already available and otherwise keeps
//! the previous values.

use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, TryRecvError};

use serde::{Deserialize, Serialize};

/// One sample of the external power-flow solver.
///
/// Channels omitted from a reading keep their previous value in the engine,
/// as do absent aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverReading {
    /// Named line flows and load values (`trA`, `Load1`, `PowPlant`, ...).
    #[serde(default)]
    pub channels: BTreeMap<String, f64>,
    /// Total generation capacity.
    #[serde(default)]
    pub capacity: Option<f64>,
    /// Total renewable generation.
    #[serde(default)]
    pub renewable: Option<f64>,
}

impl SolverReading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: impl Into<String>, value: f64) -> Self {
        self.channels.insert(channel.into(), value);
        self
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_renewable(mut self, renewable: f64) -> Self {
        self.renewable = Some(renewable);
        self
    }

    pub fn get(&self, channel: &str) -> Option<f64> {
        self.channels.get(channel).copied()
    }
}

/// Non-blocking supplier of solver readings.
pub trait ReadingSource {
    /// The newest reading not yet seen, if any. Must not block.
    fn poll(&mut self) -> Option<SolverReading>;
}

/// Drains the channel and keeps only the newest reading. A disconnected
/// sender simply stops producing readings.
impl ReadingSource for Receiver<SolverReading> {
    fn poll(&mut self) -> Option<SolverReading> {
        let mut latest = None;
        loop {
            match self.try_recv() {
                Ok(reading) => latest = Some(reading),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return latest,
            }
        }
    }
}

/// Holds one reading that is delivered on the next poll.
#[derive(Debug, Clone, Default)]
pub struct FixedReading {
    pending: Option<SolverReading>,
}

impl FixedReading {
    pub fn new(reading: SolverReading) -> Self {
        Self {
            pending: Some(reading),
        }
    }

    /// Replace the pending reading.
    pub fn set(&mut self, reading: SolverReading) {
        self.pending = Some(reading);
    }
}

impl ReadingSource for FixedReading {
    fn poll(&mut self) -> Option<SolverReading> {
        self.pending.take()
    }
}

/// A source that never has data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReading;

impl ReadingSource for NoReading {
    fn poll(&mut self) -> Option<SolverReading> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn builder_and_lookup() {
        let r = SolverReading::new()
            .with("trA", 1.5)
            .with("Load1", -0.2)
            .with_capacity(10.0);
        assert_eq!(r.get("trA"), Some(1.5));
        assert_eq!(r.get("Load1"), Some(-0.2));
        assert_eq!(r.get("trB"), None);
        assert_eq!(r.capacity, Some(10.0));
        assert_eq!(r.renewable, None);
    }

    #[test]
    fn receiver_drains_to_latest() {
        let (tx, mut rx) = mpsc::channel();
        assert_eq!(rx.poll(), None);
        tx.send(SolverReading::new().with("trA", 1.0)).unwrap();
        tx.send(SolverReading::new().with("trA", 2.0)).unwrap();
        assert_eq!(rx.poll().unwrap().get("trA"), Some(2.0));
        assert_eq!(rx.poll(), None);
        drop(tx);
        assert_eq!(rx.poll(), None);
    }

    #[test]
    fn fixed_reading_delivers_once() {
        let mut src = FixedReading::new(SolverReading::new().with("trA", 1.0));
        assert!(src.poll().is_some());
        assert!(src.poll().is_none());
        src.set(SolverReading::new());
        assert!(src.poll().is_some());
        assert!(NoReading.poll().is_none());
    }

    #[test]
    fn reading_from_json() {
        let r: SolverReading =
            serde_json::from_str(r#"{ "channels": { "trA": 0.5 }, "renewable": 3.0 }"#).unwrap();
        assert_eq!(r.get("trA"), Some(0.5));
        assert_eq!(r.renewable, Some(3.0));
        assert_eq!(r.capacity, None);
    }
}
