//! Per-point illumination state, rebuilt from the live token set every step
//! and published as an immutable [`FlowSnapshot`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::id::PointId;
use crate::token::{Token, TokenKind};
use crate::topology::Topology;

/// Brightness of a lit point, ordered dimmest to full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Intensity {
    Dimmest,
    Dimmer,
    Full,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightState {
    #[default]
    Off,
    Lit { kind: TokenKind, intensity: Intensity },
}

impl LightState {
    pub fn lit(kind: TokenKind, intensity: Intensity) -> Self {
        LightState::Lit { kind, intensity }
    }

    pub fn is_off(self) -> bool {
        self == LightState::Off
    }

    pub fn intensity(self) -> Option<Intensity> {
        match self {
            LightState::Off => None,
            LightState::Lit { intensity, .. } => Some(intensity),
        }
    }

    /// Single-character code used by the LED controller line protocol.
    /// `'1'` is reserved by the firmware and never produced.
    pub fn signal(self) -> char {
        use Intensity::*;
        use TokenKind::*;
        match self {
            LightState::Off => '0',
            LightState::Lit { kind, intensity } => match (kind, intensity) {
                (Conventional, Full) => '2',
                (Conventional, Dimmer) => '3',
                (Conventional, Dimmest) => '4',
                (Qualifying, Full) => '5',
                (Qualifying, Dimmer) => '6',
                (Qualifying, Dimmest) => '7',
            },
        }
    }

    pub fn from_signal(code: char) -> Option<LightState> {
        use Intensity::*;
        use TokenKind::*;
        let lit = |kind, intensity| Some(LightState::Lit { kind, intensity });
        match code {
            '0' => Some(LightState::Off),
            '2' => lit(Conventional, Full),
            '3' => lit(Conventional, Dimmer),
            '4' => lit(Conventional, Dimmest),
            '5' => lit(Qualifying, Full),
            '6' => lit(Qualifying, Dimmer),
            '7' => lit(Qualifying, Dimmest),
            _ => None,
        }
    }
}

/// Immutable point → state mapping for one completed step.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSnapshot {
    step: u64,
    points: Arc<[PointId]>,
    states: Vec<LightState>,
}

impl FlowSnapshot {
    /// Every point off.
    pub fn dark(points: Arc<[PointId]>) -> Self {
        let states = vec![LightState::Off; points.len()];
        Self {
            step: 0,
            points,
            states,
        }
    }

    /// Number of the step this snapshot was published after.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// State of `point`. Unknown points read as off.
    pub fn state(&self, point: PointId) -> LightState {
        self.points
            .binary_search(&point)
            .ok()
            .and_then(|i| self.states.get(i).copied())
            .unwrap_or_default()
    }

    /// `(point, state)` pairs in ascending point order.
    pub fn iter(&self) -> impl Iterator<Item = (PointId, LightState)> + '_ {
        self.points.iter().copied().zip(self.states.iter().copied())
    }

    pub fn states(&self) -> &[LightState] {
        &self.states
    }

    /// One state code per point, in ascending point order.
    pub fn signal_string(&self) -> String {
        self.states.iter().map(|s| s.signal()).collect()
    }

    pub fn lit_count(&self) -> usize {
        self.states.iter().filter(|s| !s.is_off()).count()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Builds a fresh snapshot from the token set and swaps it in.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    points: Arc<[PointId]>,
    current: Arc<FlowSnapshot>,
    trail: usize,
}

impl SnapshotPublisher {
    /// `trail` is how many points behind each token's `to` point are also
    /// lit (at most 2: dimmer, then dimmest). Zero lights only `to`.
    pub fn new(points: &[PointId], trail: usize) -> Self {
        let points: Arc<[PointId]> = Arc::from(points);
        Self {
            current: Arc::new(FlowSnapshot::dark(points.clone())),
            points,
            trail: trail.min(2),
        }
    }

    pub fn current(&self) -> Arc<FlowSnapshot> {
        self.current.clone()
    }

    /// Recompute every point from scratch and publish.
    ///
    /// A point is off unless a non-fading token has it as its `to` point.
    /// Writes are unconditional in token order, so where tokens disagree the
    /// last one wins. A token writes its trail before its `to` point.
    pub fn publish<'a, I>(&mut self, step: u64, topology: &Topology, tokens: I) -> Arc<FlowSnapshot>
    where
        I: IntoIterator<Item = &'a Token>,
    {
        let mut states = vec![LightState::Off; self.points.len()];
        let levels = [Intensity::Full, Intensity::Dimmer, Intensity::Dimmest];

        for token in tokens {
            if token.is_fading() {
                continue;
            }
            let Some(segment) = topology.segment(token.segment) else {
                continue;
            };
            let mut lit = [None; 3];
            let mut index = Some(token.to_index);
            for slot in lit.iter_mut().take(self.trail + 1) {
                let Some(i) = index else { break };
                *slot = Some(i);
                index = token.direction.prev_index(i, segment.len());
            }
            for (&i, &intensity) in lit.iter().zip(&levels).rev() {
                let Some(i) = i else { continue };
                if let Some(point) = segment.point(i)
                    && let Ok(slot) = self.points.binary_search(&point)
                {
                    states[slot] = LightState::lit(token.kind, intensity);
                }
            }
        }

        self.current = Arc::new(FlowSnapshot {
            step,
            points: self.points.clone(),
            states,
        });
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::id::SegmentId;
    use crate::test_utils::line_topology;
    use crate::token::TokenState;
    use crate::topology::Direction;

    fn token(kind: TokenKind, to_index: usize, direction: Direction) -> Token {
        Token {
            kind,
            segment: SegmentId(0),
            direction,
            to_index,
            progress: 0.5,
            state: TokenState::Traveling,
        }
    }

    #[test]
    fn signal_codes_round_trip() {
        for code in ['0', '2', '3', '4', '5', '6', '7'] {
            let state = LightState::from_signal(code).unwrap();
            assert_eq!(state.signal(), code);
        }
        assert_eq!(LightState::from_signal('1'), None);
        assert_eq!(LightState::from_signal('x'), None);
    }

    #[test]
    fn dark_snapshot_covers_every_point() {
        let topo = line_topology(5);
        let publisher = SnapshotPublisher::new(topo.points(), 2);
        let snap = publisher.current();
        assert_eq!(snap.len(), 5);
        assert_eq!(snap.signal_string(), "00000");
        for &p in topo.points() {
            assert_eq!(snap.state(p), LightState::Off);
        }
        assert_eq!(snap.state(PointId(999)), LightState::Off);
    }

    #[test]
    fn only_to_points_light_by_default() {
        let topo = line_topology(5);
        let mut publisher = SnapshotPublisher::new(topo.points(), EngineConfig::default().trail);
        let tokens = [
            token(TokenKind::Conventional, 3, Direction::Forward),
            token(TokenKind::Qualifying, 2, Direction::Forward),
        ];
        let snap = publisher.publish(1, &topo, &tokens);
        assert_eq!(snap.signal_string(), "00520");
        assert_eq!(snap.step(), 1);
        assert_eq!(snap.lit_count(), 2);
    }

    #[test]
    fn opt_in_trail() {
        let topo = line_topology(5);
        let mut publisher = SnapshotPublisher::new(topo.points(), 2);
        let tokens = [token(TokenKind::Conventional, 3, Direction::Forward)];
        let snap = publisher.publish(1, &topo, &tokens);
        assert_eq!(snap.signal_string(), "04320");
    }

    #[test]
    fn backward_trail_and_qualifying_kind() {
        let topo = line_topology(5);
        let mut publisher = SnapshotPublisher::new(topo.points(), 2);
        let tokens = [token(TokenKind::Qualifying, 1, Direction::Backward)];
        let snap = publisher.publish(1, &topo, &tokens);
        assert_eq!(snap.signal_string(), "05670");
    }

    #[test]
    fn disagreement_is_last_write_wins() {
        let topo = line_topology(5);
        let mut publisher = SnapshotPublisher::new(topo.points(), 0);
        let tokens = [
            token(TokenKind::Conventional, 2, Direction::Forward),
            token(TokenKind::Qualifying, 2, Direction::Forward),
        ];
        let snap = publisher.publish(1, &topo, &tokens);
        assert_eq!(snap.signal_string(), "00500");

        // With a trail, a later token's dimmer point overwrites an earlier
        // token's full point.
        let mut publisher = SnapshotPublisher::new(topo.points(), 1);
        let tokens = [
            token(TokenKind::Conventional, 2, Direction::Forward),
            token(TokenKind::Qualifying, 3, Direction::Forward),
        ];
        let snap = publisher.publish(1, &topo, &tokens);
        assert_eq!(snap.signal_string(), "03650");
    }

    #[test]
    fn fading_tokens_are_dark() {
        let topo = line_topology(5);
        let mut publisher = SnapshotPublisher::new(topo.points(), 2);
        let mut t = token(TokenKind::Conventional, 3, Direction::Forward);
        t.state = TokenState::Fading { opacity: 0.9 };
        let snap = publisher.publish(1, &topo, [&t]);
        assert_eq!(snap.lit_count(), 0);
    }

    #[test]
    fn published_snapshots_are_independent() {
        let topo = line_topology(5);
        let mut publisher = SnapshotPublisher::new(topo.points(), 0);
        let first = publisher.publish(1, &topo, &[token(TokenKind::Conventional, 1, Direction::Forward)]);
        let second = publisher.publish(2, &topo, std::iter::empty::<&Token>());
        assert_eq!(first.signal_string(), "02000");
        assert_eq!(second.signal_string(), "00000");
        assert!(Arc::ptr_eq(&second, &publisher.current()));
    }
}
