//! Token lifecycle: spawning, travel along segments, boundary resolution
//! through the transition table, fading and removal.
//!
//! Per-token state machine:
//!
//! ```text
//! traveling --(fade rule | dead segment)--> fading --(opacity 0)--> destroyed
//! traveling --(no continuation)-----------------------------------> destroyed
//! ```

use slotmap::SlotMap;
use tracing::debug;

use crate::arbiter::{Arbiter, MAX_PATHS};
use crate::config::EngineConfig;
use crate::id::TokenId;
use crate::rng::SimRng;
use crate::token::{Token, TokenKind, TokenState};
use crate::topology::{Boundary, Topology};
use crate::transition::{Continuation, ContinuationRule, Fallback, FlowView};

/// Opacity at or below which a fading token is removed.
const OPACITY_FLOOR: f64 = 1e-9;

/// Everything a travel step reads, plus the arbitration state it mutates.
pub struct TravelContext<'a> {
    pub topology: &'a Topology,
    pub view: FlowView<'a>,
    /// One arbiter per junction, indexed by [`JunctionId`](crate::id::JunctionId).
    pub arbiters: &'a mut [Arbiter],
    pub rng: &'a mut SimRng,
    pub config: &'a EngineConfig,
}

impl TravelContext<'_> {
    /// Decide what happens to a token arriving at `at`.
    pub fn resolve(&mut self, at: Boundary) -> Continuation {
        let topology = self.topology;
        let Some(rule) = topology.rule(at) else {
            return Continuation::Stranded;
        };
        match rule {
            ContinuationRule::Fade => Continuation::Fade,
            ContinuationRule::PassThrough { target } => Continuation::Enter(*target),
            ContinuationRule::Branch {
                junction,
                candidates,
            } => {
                let Some(j) = topology.junction(*junction) else {
                    return Continuation::Stranded;
                };
                let mut weights = [0.0; MAX_PATHS];
                for c in candidates {
                    if let Some(target) = j.paths.get(c.path) {
                        weights[c.path] = c.weight.evaluate(&self.view, *target);
                    }
                }
                // Nothing downstream carries flow.
                if weights.iter().all(|w| *w <= 0.0) {
                    return Continuation::Fade;
                }
                let Some(arbiter) = self.arbiters.get_mut(junction.index()) else {
                    return Continuation::Stranded;
                };
                let weights = &weights[..j.paths.len()];
                let winner = if j.symmetric {
                    arbiter.choose_jittered(weights, self.rng, self.config.jitter)
                } else {
                    arbiter.choose(weights)
                };
                if candidates.iter().any(|c| c.path == winner) {
                    Continuation::Enter(j.paths[winner])
                } else {
                    Continuation::Stranded
                }
            }
            ContinuationRule::Guarded {
                junction,
                condition,
                then,
                otherwise,
            } => {
                let Some(j) = topology.junction(*junction) else {
                    return Continuation::Stranded;
                };
                let path = if condition.holds(&self.view) {
                    *then
                } else {
                    match otherwise {
                        Fallback::Fade => return Continuation::Fade,
                        Fallback::Path(p) => *p,
                    }
                };
                j.paths
                    .get(path)
                    .map_or(Continuation::Stranded, |b| Continuation::Enter(*b))
            }
        }
    }
}

/// Counts from one [`TokenManager::advance`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Tokens that began fading at a fade rule.
    pub faded: u32,
    /// Fading tokens that reached zero opacity and were removed.
    pub expired: u32,
    /// Tokens removed at a boundary with no continuation.
    pub stranded: u32,
}

enum Travel {
    Moving,
    Stranded,
}

/// Owns the live token set.
#[derive(Debug, Clone, Default)]
pub struct TokenManager {
    tokens: SlotMap<TokenId, Token>,
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a traveling token entering the segment at `entry`.
    pub fn spawn(&mut self, topology: &Topology, kind: TokenKind, entry: Boundary) -> Option<TokenId> {
        let segment = topology.segment(entry.segment)?;
        Some(self.tokens.insert(Token::entering(kind, entry, segment)))
    }

    /// Insert an arbitrary token.
    pub fn insert(&mut self, token: Token) -> TokenId {
        self.tokens.insert(token)
    }

    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub fn remove(&mut self, id: TokenId) -> Option<Token> {
        self.tokens.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &Token)> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Advance every token by `dt` seconds.
    ///
    /// Fading tokens lose `dt / fade_duration` opacity and are removed at
    /// zero; traveling tokens move along their segment and across boundaries.
    pub fn advance(&mut self, ctx: &mut TravelContext<'_>, dt: f64) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        let mut doomed = Vec::new();
        let fade_duration = ctx.config.fade_duration;

        for (id, token) in self.tokens.iter_mut() {
            match token.state {
                TokenState::Fading { opacity } => {
                    let opacity = if fade_duration > 0.0 {
                        opacity - dt / fade_duration
                    } else {
                        0.0
                    };
                    if opacity <= OPACITY_FLOOR {
                        report.expired += 1;
                        doomed.push(id);
                    } else {
                        token.state = TokenState::Fading { opacity };
                    }
                }
                TokenState::Traveling => match travel(token, ctx, dt) {
                    Travel::Moving => {
                        if token.is_fading() {
                            report.faded += 1;
                        }
                    }
                    Travel::Stranded => {
                        report.stranded += 1;
                        doomed.push(id);
                    }
                },
            }
        }

        for id in doomed {
            self.tokens.remove(id);
        }
        report
    }

    /// Start fading every traveling token on a segment whose flow is at or
    /// below the off threshold. Returns how many began fading.
    pub fn fade_on_dead_segments(&mut self, view: &FlowView<'_>) -> u32 {
        let mut faded = 0;
        for token in self.tokens.values_mut() {
            if token.is_fading() {
                continue;
            }
            let flow = view
                .segment_flows
                .get(token.segment.index())
                .copied()
                .unwrap_or(0.0);
            if flow <= view.epsilon {
                token.begin_fade();
                faded += 1;
            }
        }
        faded
    }
}

fn travel(token: &mut Token, ctx: &mut TravelContext<'_>, dt: f64) -> Travel {
    let topology = ctx.topology;
    let Some(segment) = topology.segment(token.segment) else {
        return Travel::Stranded;
    };
    let flow = ctx
        .view
        .segment_flows
        .get(token.segment.index())
        .copied()
        .unwrap_or(0.0);
    let mut distance = flow * segment.scale * ctx.config.flow_speed * dt;
    if !distance.is_finite() || distance <= 0.0 {
        return Travel::Moving;
    }

    let mut hops = 0;
    loop {
        let Some(segment) = topology.segment(token.segment) else {
            return Travel::Stranded;
        };
        let len = segment.len();
        let span = topology.span_length(token.segment, token.from_index(len), token.to_index);
        token.progress += distance / span;
        if token.progress <= 1.0 {
            return Travel::Moving;
        }

        hops += 1;
        if hops > ctx.config.max_hops {
            token.progress = 1.0;
            return Travel::Moving;
        }
        distance = (token.progress - 1.0) * span;

        if let Some(next) = token.direction.next_index(token.to_index, len) {
            token.to_index = next;
            token.progress = 0.0;
            continue;
        }

        let at = Boundary::new(token.segment, token.direction.end_reached());
        match ctx.resolve(at) {
            Continuation::Enter(target) => {
                let Some(next_segment) = topology.segment(target.segment) else {
                    return Travel::Stranded;
                };
                let kind = token.kind;
                *token = Token::entering(kind, target, next_segment);
            }
            Continuation::Fade => {
                token.progress = 1.0;
                token.begin_fade();
                return Travel::Moving;
            }
            Continuation::Stranded => {
                debug!(
                    segment = %segment.name,
                    end = ?at.end,
                    "no continuation at boundary; token dropped"
                );
                return Travel::Stranded;
            }
        }
    }
}
