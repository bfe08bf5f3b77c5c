use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::accumulator::EmissionAccumulator;
use crate::arbiter::{Arbiter, MAX_PATHS};
use crate::config::{ConfigError, EngineConfig};
use crate::id::{SegmentId, TokenId};
use crate::lifecycle::{TokenManager, TravelContext};
use crate::reading::SolverReading;
use crate::rng::SimRng;
use crate::snapshot::{FlowSnapshot, SnapshotPublisher};
use crate::token::{Token, TokenKind, TokenView};
use crate::topology::{Boundary, End, Source, Topology};
use crate::transition::FlowView;

/// Counts from one [`FlowEngine::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepResult {
    pub spawned: u32,
    /// Tokens that began fading this step (fade rules and dead segments).
    pub faded: u32,
    /// Tokens removed after fading out.
    pub expired: u32,
    /// Tokens removed at a boundary with no continuation.
    pub stranded: u32,
}

/// The flow animation engine.
///
/// Owns the segment flows, spawn accumulators, junction arbiters and the
/// live token set. All mutation happens inside [`apply_reading`] and
/// [`step`]; the outside world only sees published [`FlowSnapshot`]s and
/// [`TokenView`]s.
///
/// [`apply_reading`]: Self::apply_reading
/// [`step`]: Self::step
#[derive(Debug)]
pub struct FlowEngine {
    topology: Topology,
    config: EngineConfig,
    /// Sanitized channel values, by `ChannelId`.
    channels: Vec<f64>,
    capacity: f64,
    renewable: f64,
    /// Current flow per segment, never negative.
    segment_flows: Vec<f64>,
    /// Spawn accumulator pair per segment.
    emitters: Vec<EmissionAccumulator>,
    /// Arbiter per junction.
    arbiters: Vec<Arbiter>,
    rng: SimRng,
    tokens: TokenManager,
    publisher: SnapshotPublisher,
    step: u64,
}

impl FlowEngine {
    pub fn new(topology: Topology, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let emitters = topology
            .segments()
            .iter()
            .map(|_| EmissionAccumulator::new(config.emission_gain))
            .collect();
        let arbiters = topology
            .junctions()
            .iter()
            .map(|j| Arbiter::new(j.paths.len()))
            .collect();
        Ok(Self {
            channels: vec![0.0; topology.channel_count()],
            capacity: 0.0,
            renewable: 0.0,
            segment_flows: vec![0.0; topology.segments().len()],
            emitters,
            arbiters,
            rng: SimRng::new(config.seed),
            tokens: TokenManager::new(),
            publisher: SnapshotPublisher::new(topology.points(), config.trail),
            step: 0,
            topology,
            config,
        })
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    /// Take in a solver reading. Channels and aggregates the reading omits
    /// keep their previous values; non-finite values are clamped to zero.
    pub fn apply_reading(&mut self, reading: &SolverReading) {
        for (name, &value) in &reading.channels {
            match self.topology.channel_id(name) {
                Some(id) => self.channels[id.index()] = sanitize(name, value),
                None => trace!(channel = %name, "reading channel not used by topology"),
            }
        }
        if let Some(capacity) = reading.capacity {
            self.capacity = sanitize("capacity", capacity);
        }
        if let Some(renewable) = reading.renewable {
            self.renewable = sanitize("renewable", renewable);
        }
        self.recompute_segment_flows();
    }

    fn recompute_segment_flows(&mut self) {
        for (i, segment) in self.topology.segments().iter().enumerate() {
            let binding = segment.flow;
            let mut flow = self.channels[binding.channel.index()] * binding.share;
            if binding.per_capacity {
                flow = if self.capacity > 0.0 {
                    flow / self.capacity
                } else {
                    0.0
                };
            }
            if flow < 0.0 {
                debug!(segment = %segment.name, flow, "negative segment flow clamped to zero");
                flow = 0.0;
            }
            self.segment_flows[i] = flow;
        }
    }

    /// Override one segment's flow until the next reading. Invalid values
    /// are clamped to zero.
    pub fn set_segment_flow(&mut self, segment: SegmentId, flow: f64) {
        let flow = if flow.is_finite() && flow > 0.0 {
            flow
        } else {
            if !flow.is_finite() {
                warn!(segment = segment.0, "non-finite segment flow clamped to zero");
            }
            0.0
        };
        if let Some(slot) = self.segment_flows.get_mut(segment.index()) {
            *slot = flow;
        }
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Advance the animation by `dt` seconds and publish a new snapshot.
    ///
    /// 1. **Spawn** -- run every source's accumulators; new tokens enter at
    ///    the source segment's head (or a generation branch's tail).
    /// 2. **Travel** -- move tokens, resolve boundaries, fade and expire.
    /// 3. **Retract** -- traveling tokens on segments whose flow is off
    ///    start fading.
    /// 4. **Publish** -- rebuild the point states from the token set.
    ///
    /// A zero `dt` is a valid no-op step that still republishes. Negative or
    /// non-finite `dt` is treated as zero.
    pub fn step(&mut self, dt: f64) -> StepResult {
        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            warn!(dt, "invalid step duration treated as zero");
            0.0
        };

        let mut result = StepResult {
            spawned: self.spawn_from_sources(dt),
            ..Default::default()
        };

        let view = FlowView {
            channels: &self.channels,
            segment_flows: &self.segment_flows,
            epsilon: self.config.off_threshold,
        };
        let mut ctx = TravelContext {
            topology: &self.topology,
            view,
            arbiters: &mut self.arbiters,
            rng: &mut self.rng,
            config: &self.config,
        };
        let report = self.tokens.advance(&mut ctx, dt);
        result.faded = report.faded + self.tokens.fade_on_dead_segments(&view);
        result.expired = report.expired;
        result.stranded = report.stranded;

        self.step += 1;
        self.publisher.publish(
            self.step,
            &self.topology,
            self.tokens.iter().map(|(_, t)| t),
        );
        result
    }

    fn spawn_from_sources(&mut self, dt: f64) -> u32 {
        let topology = &self.topology;
        let eps = self.config.off_threshold;
        let flows = &self.segment_flows;

        let boundary_total: f64 = topology
            .sources()
            .iter()
            .filter_map(|s| match s {
                Source::Boundary { segment } => flows.get(segment.index()).copied(),
                _ => None,
            })
            .sum();

        let mut spawned = 0;
        for source in topology.sources() {
            let (entry, total, qualifying) = match *source {
                Source::Boundary { segment } => {
                    let flow = flows[segment.index()];
                    if flow <= eps {
                        continue;
                    }
                    let qualifying = if boundary_total > 0.0 && self.capacity > 0.0 {
                        self.renewable * flow / boundary_total / self.capacity
                    } else {
                        0.0
                    };
                    (Boundary::new(segment, End::Head), flow, qualifying)
                }
                Source::Generator { segment } => {
                    let flow = flows[segment.index()];
                    if flow <= eps {
                        continue;
                    }
                    (Boundary::new(segment, End::Head), flow, flow)
                }
                Source::LocalGeneration {
                    load,
                    flow,
                    junction,
                } => {
                    let rate = self.channels[flow.index()];
                    if self.channels[load.index()] >= 0.0 || rate <= eps {
                        continue;
                    }
                    let Some(j) = topology.junction(junction) else {
                        continue;
                    };
                    let Some(arbiter) = self.arbiters.get_mut(junction.index()) else {
                        continue;
                    };
                    let equal = [1.0; MAX_PATHS];
                    let winner =
                        arbiter.choose_jittered(&equal[..j.paths.len()], &mut self.rng, self.config.jitter);
                    (j.paths[winner], rate, rate)
                }
            };

            let emissions = self.emitters[entry.segment.index()].advance_limited(
                total,
                qualifying,
                dt,
                self.config.spawn_limit,
            );
            for (kind, count) in [
                (TokenKind::Conventional, emissions.base),
                (TokenKind::Qualifying, emissions.qualifying),
            ] {
                for _ in 0..count {
                    if self.tokens.spawn(topology, kind, entry).is_some() {
                        spawned += 1;
                    }
                }
            }
        }
        spawned
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<FlowSnapshot> {
        self.publisher.current()
    }

    /// Renderer view of every live token, fading ones included.
    pub fn tokens(&self) -> Vec<TokenView> {
        self.tokens
            .iter()
            .filter_map(|(_, t)| self.view_of(t))
            .collect()
    }

    fn view_of(&self, token: &Token) -> Option<TokenView> {
        let segment = self.topology.segment(token.segment)?;
        Some(TokenView {
            kind: token.kind,
            from: segment.point(token.from_index(segment.len()))?,
            to: segment.point(token.to_index)?,
            progress: token.progress.clamp(0.0, 1.0),
            opacity: token.opacity(),
            fading: token.is_fading(),
        })
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    /// Place a token directly, bypassing the sources.
    pub fn place_token(&mut self, token: Token) -> TokenId {
        self.tokens.insert(token)
    }

    /// Place a traveling token entering at `entry`.
    pub fn spawn_at(&mut self, kind: TokenKind, entry: Boundary) -> Option<TokenId> {
        self.tokens.spawn(&self.topology, kind, entry)
    }

    pub fn live_tokens(&self) -> usize {
        self.tokens.len()
    }

    pub fn segment_flow(&self, segment: SegmentId) -> f64 {
        self.segment_flows
            .get(segment.index())
            .copied()
            .unwrap_or(0.0)
    }

    /// Current (sanitized) value of a named channel.
    pub fn channel(&self, name: &str) -> Option<f64> {
        let id = self.topology.channel_id(name)?;
        self.channels.get(id.index()).copied()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Drop every token and all accumulated history; keep flows.
    pub fn reset(&mut self) {
        self.tokens.clear();
        self.emitters.iter_mut().for_each(EmissionAccumulator::reset);
        self.arbiters.iter_mut().for_each(Arbiter::reset);
        self.rng = SimRng::new(self.config.seed);
        self.publisher.publish(self.step, &self.topology, std::iter::empty());
    }
}

fn sanitize(channel: &str, value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!(channel, value, "non-finite reading clamped to zero");
        0.0
    }
}
