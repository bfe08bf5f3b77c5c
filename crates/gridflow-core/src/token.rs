//! Tokens: the moving visual units that represent quanta of flow.

use serde::{Deserialize, Serialize};

use crate::id::{PointId, SegmentId};
use crate::topology::{Boundary, Direction, Segment};

/// Closed set of token types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Flow from conventional generation.
    Conventional,
    /// Renewable-sourced flow.
    Qualifying,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TokenState {
    Traveling,
    /// Opacity falls linearly from 1 to 0 over the fade duration.
    Fading { opacity: f64 },
}

/// A live token. Owned by the [`TokenManager`](crate::lifecycle::TokenManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub segment: SegmentId,
    pub direction: Direction,
    /// Index (into the segment's points) of the point being approached.
    pub to_index: usize,
    /// Fraction of the current span covered.
    pub progress: f64,
    pub state: TokenState,
}

impl Token {
    /// A traveling token at the start of the first span inward from `entry`.
    pub fn entering(kind: TokenKind, entry: Boundary, segment: &Segment) -> Token {
        let direction = entry.end.entry_direction();
        let start = segment.end_index(entry.end);
        let to_index = direction
            .next_index(start, segment.len())
            .unwrap_or(start);
        Token {
            kind,
            segment: entry.segment,
            direction,
            to_index,
            progress: 0.0,
            state: TokenState::Traveling,
        }
    }

    /// Index of the point the current span starts from.
    pub fn from_index(&self, segment_len: usize) -> usize {
        self.direction
            .prev_index(self.to_index, segment_len)
            .unwrap_or(self.to_index)
    }

    pub fn is_fading(&self) -> bool {
        matches!(self.state, TokenState::Fading { .. })
    }

    pub fn opacity(&self) -> f64 {
        match self.state {
            TokenState::Traveling => 1.0,
            TokenState::Fading { opacity } => opacity,
        }
    }

    /// Start fading at full opacity. No-op if already fading.
    pub fn begin_fade(&mut self) {
        if !self.is_fading() {
            self.state = TokenState::Fading { opacity: 1.0 };
        }
    }
}

/// What the renderer sees of a token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenView {
    pub kind: TokenKind,
    pub from: PointId,
    pub to: PointId,
    /// Progress from `from` to `to`, clamped to `[0, 1]`.
    pub progress: f64,
    pub opacity: f64,
    pub fading: bool,
}

impl TokenView {
    /// Interpolated position given a point coordinate lookup. `None` if the
    /// lookup knows neither endpoint.
    pub fn position<F>(&self, lookup: F) -> Option<(f32, f32)>
    where
        F: Fn(PointId) -> Option<(f32, f32)>,
    {
        match (lookup(self.from), lookup(self.to)) {
            (Some((ax, ay)), Some((bx, by))) => {
                let t = self.progress as f32;
                Some((ax + (bx - ax) * t, ay + (by - ay) * t))
            }
            (Some(p), None) | (None, Some(p)) => Some(p),
            (None, None) => None,
        }
    }
}
