use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::arbiter::MAX_PATHS;
use crate::id::*;
use crate::transition::{Candidate, Condition, ContinuationRule, Fallback, WeightRule};
use crate::wiring::{
    ConditionSpec, FallbackSpec, PathSpec, RuleSpec, SourceSpec, WeightSpec, WiringDescription,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Configuration defects found while building a [`Topology`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error("point {0} declared more than once")]
    DuplicatePoint(u32),
    #[error("point range {first}..={last} is empty")]
    InvalidPointRange { first: u32, last: u32 },
    #[error("segment `{0}` has fewer than two points")]
    SegmentTooShort(String),
    #[error("`{context}` references undeclared point {point}")]
    UndeclaredPoint { point: u32, context: String },
    #[error("segment `{0}` declared more than once")]
    DuplicateSegment(String),
    #[error("junction `{0}` declared more than once")]
    DuplicateJunction(String),
    #[error("`{context}` references unknown segment `{name}`")]
    UnknownSegment { name: String, context: String },
    #[error("`{context}` references unknown junction `{name}`")]
    UnknownJunction { name: String, context: String },
    #[error("junction `{name}` has {paths} paths, expected 2..=3")]
    JunctionArity { name: String, paths: usize },
    #[error("`{context}` uses path {path} of junction `{junction}` which has {paths} paths")]
    PathOutOfRange {
        junction: String,
        path: usize,
        paths: usize,
        context: String,
    },
    #[error("endpoint {segment}.{end:?} belongs to both `{first}` and `{second}`")]
    SharedEndpoint {
        segment: String,
        end: End,
        first: String,
        second: String,
    },
    #[error("boundary {segment}.{end:?} has more than one rule")]
    DuplicateRule { segment: String, end: End },
    #[error("boundary {segment}.{end:?} is not an endpoint of junction `{junction}`")]
    BoundaryNotOnJunction {
        segment: String,
        end: End,
        junction: String,
    },
    #[error("segment `{0}` has a negative or non-finite share or scale")]
    InvalidShare(String),
}

// ---------------------------------------------------------------------------
// Geometry vocabulary
// ---------------------------------------------------------------------------

/// One end of a segment. The head is the first declared point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum End {
    Head,
    Tail,
}

impl End {
    pub fn opposite(self) -> End {
        match self {
            End::Head => End::Tail,
            End::Tail => End::Head,
        }
    }

    /// Direction of travel for a token entering the segment at this end.
    pub fn entry_direction(self) -> Direction {
        match self {
            End::Head => Direction::Forward,
            End::Tail => Direction::Backward,
        }
    }
}

/// Travel direction along a segment's declared point order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// The end a token reaches when it runs out of segment in this direction.
    pub fn end_reached(self) -> End {
        match self {
            Direction::Forward => End::Tail,
            Direction::Backward => End::Head,
        }
    }

    /// The point index after `index` in this direction, within `len` points.
    pub fn next_index(self, index: usize, len: usize) -> Option<usize> {
        match self {
            Direction::Forward if index + 1 < len => Some(index + 1),
            Direction::Backward if index > 0 && index < len => Some(index - 1),
            _ => None,
        }
    }

    /// The point index before `index` in this direction.
    pub fn prev_index(self, index: usize, len: usize) -> Option<usize> {
        self.reverse().next_index(index, len)
    }
}

/// A segment endpoint. Also the key of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Boundary {
    pub segment: SegmentId,
    pub end: End,
}

impl Boundary {
    pub fn new(segment: SegmentId, end: End) -> Self {
        Self { segment, end }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JunctionKind {
    /// Branch/merge point on the network; consulted by the transition table.
    #[default]
    Network,
    /// Picks which branch a local generator feeds back into.
    Generation,
}

// ---------------------------------------------------------------------------
// Arena entries
// ---------------------------------------------------------------------------

/// Resolved flow binding of a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSource {
    pub channel: ChannelId,
    pub share: f64,
    pub per_capacity: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    pub points: Vec<PointId>,
    pub flow: FlowSource,
    pub scale: f64,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<PointId> {
        self.points.get(index).copied()
    }

    /// Index of the point at the given end.
    pub fn end_index(&self, end: End) -> usize {
        match end {
            End::Head => 0,
            End::Tail => self.points.len().saturating_sub(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    pub name: String,
    pub kind: JunctionKind,
    pub symmetric: bool,
    /// Arbitrated endpoints, in declaration order (ties go to the first).
    pub paths: Vec<Boundary>,
    /// Endpoints that meet here without being chosen between.
    pub feeders: Vec<Boundary>,
}

impl Junction {
    /// Every endpoint meeting at this junction.
    pub fn endpoints(&self) -> impl Iterator<Item = Boundary> + '_ {
        self.paths.iter().chain(self.feeders.iter()).copied()
    }
}

/// Where tokens are injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Network boundary feed at the segment head.
    Boundary { segment: SegmentId },
    /// Renewable generator feed at the segment head.
    Generator { segment: SegmentId },
    /// Local generation at a negative load, fed back up one of the
    /// generation junction's branches.
    LocalGeneration {
        load: ChannelId,
        flow: ChannelId,
        junction: JunctionId,
    },
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Static grid topology: points, segments, junctions and the transition
/// table. Read-only after [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct Topology {
    points: Vec<PointId>,
    positions: HashMap<PointId, (f32, f32)>,
    segments: Vec<Segment>,
    junctions: Vec<Junction>,
    channels: Vec<String>,
    channel_index: HashMap<String, ChannelId>,
    segment_index: HashMap<String, SegmentId>,
    junction_index: HashMap<String, JunctionId>,
    rules: HashMap<Boundary, ContinuationRule>,
    sources: Vec<Source>,
    segments_at: BTreeMap<PointId, Vec<SegmentId>>,
    endpoint_junction: HashMap<Boundary, JunctionId>,
}

impl Topology {
    /// Resolve and validate a wiring description.
    pub fn build(desc: &WiringDescription) -> Result<Topology, TopologyError> {
        let mut b = Builder::default();

        // Points.
        let mut declared = HashSet::new();
        let ranges = desc.point_ranges.iter().map(|r| {
            if r.first > r.last {
                Err(TopologyError::InvalidPointRange {
                    first: r.first,
                    last: r.last,
                })
            } else {
                Ok(r.first..=r.last)
            }
        });
        for range in ranges {
            for p in range? {
                if !declared.insert(p) {
                    return Err(TopologyError::DuplicatePoint(p));
                }
            }
        }
        for &p in &desc.points {
            if !declared.insert(p) {
                return Err(TopologyError::DuplicatePoint(p));
            }
        }
        let mut points: Vec<PointId> = declared.iter().copied().map(PointId).collect();
        points.sort();

        let mut positions = HashMap::new();
        for pos in &desc.positions {
            if !declared.contains(&pos.id) {
                return Err(TopologyError::UndeclaredPoint {
                    point: pos.id,
                    context: "positions".into(),
                });
            }
            positions.insert(PointId(pos.id), (pos.x, pos.y));
        }

        // Segments.
        let mut segments = Vec::with_capacity(desc.segments.len());
        let mut segment_index = HashMap::new();
        let mut segments_at: BTreeMap<PointId, Vec<SegmentId>> = BTreeMap::new();
        for spec in &desc.segments {
            if spec.points.len() < 2 {
                return Err(TopologyError::SegmentTooShort(spec.name.clone()));
            }
            let share_ok = spec.flow.share.is_finite() && spec.flow.share >= 0.0;
            let scale_ok = spec.scale.is_finite() && spec.scale >= 0.0;
            if !share_ok || !scale_ok {
                return Err(TopologyError::InvalidShare(spec.name.clone()));
            }
            let id = SegmentId(segments.len() as u32);
            if segment_index.insert(spec.name.clone(), id).is_some() {
                return Err(TopologyError::DuplicateSegment(spec.name.clone()));
            }
            for &p in &spec.points {
                if !declared.contains(&p) {
                    return Err(TopologyError::UndeclaredPoint {
                        point: p,
                        context: spec.name.clone(),
                    });
                }
                let at = segments_at.entry(PointId(p)).or_default();
                if !at.contains(&id) {
                    at.push(id);
                }
            }
            segments.push(Segment {
                name: spec.name.clone(),
                points: spec.points.iter().copied().map(PointId).collect(),
                flow: FlowSource {
                    channel: b.intern(&spec.flow.channel),
                    share: spec.flow.share,
                    per_capacity: spec.flow.per_capacity,
                },
                scale: spec.scale,
            });
        }

        let resolve_path = |path: &PathSpec, context: &str| -> Result<Boundary, TopologyError> {
            let segment = segment_index.get(&path.segment).copied().ok_or_else(|| {
                TopologyError::UnknownSegment {
                    name: path.segment.clone(),
                    context: context.to_string(),
                }
            })?;
            Ok(Boundary::new(segment, path.end))
        };

        // Junctions.
        let mut junctions: Vec<Junction> = Vec::with_capacity(desc.junctions.len());
        let mut junction_index = HashMap::new();
        let mut endpoint_junction: HashMap<Boundary, JunctionId> = HashMap::new();
        for spec in &desc.junctions {
            if !(2..=MAX_PATHS).contains(&spec.paths.len()) {
                return Err(TopologyError::JunctionArity {
                    name: spec.name.clone(),
                    paths: spec.paths.len(),
                });
            }
            let id = JunctionId(junctions.len() as u32);
            if junction_index.insert(spec.name.clone(), id).is_some() {
                return Err(TopologyError::DuplicateJunction(spec.name.clone()));
            }
            let paths = spec
                .paths
                .iter()
                .map(|p| resolve_path(p, &spec.name))
                .collect::<Result<Vec<_>, _>>()?;
            let feeders = spec
                .feeders
                .iter()
                .map(|p| resolve_path(p, &spec.name))
                .collect::<Result<Vec<_>, _>>()?;
            for endpoint in paths.iter().chain(feeders.iter()) {
                if let Some(&other) = endpoint_junction.get(endpoint) {
                    let first = if other == id {
                        spec.name.clone()
                    } else {
                        junctions[other.index()].name.clone()
                    };
                    return Err(TopologyError::SharedEndpoint {
                        segment: segments[endpoint.segment.index()].name.clone(),
                        end: endpoint.end,
                        first,
                        second: spec.name.clone(),
                    });
                }
                endpoint_junction.insert(*endpoint, id);
            }
            junctions.push(Junction {
                name: spec.name.clone(),
                kind: spec.kind,
                symmetric: spec.symmetric,
                paths,
                feeders,
            });
        }

        let lookup_junction = |name: &str, context: &str| -> Result<JunctionId, TopologyError> {
            junction_index
                .get(name)
                .copied()
                .ok_or_else(|| TopologyError::UnknownJunction {
                    name: name.to_string(),
                    context: context.to_string(),
                })
        };

        // Transition table.
        let mut rules = HashMap::new();
        for spec in &desc.boundaries {
            let at = resolve_path(
                &PathSpec {
                    segment: spec.segment.clone(),
                    end: spec.end,
                },
                "boundaries",
            )?;
            let context = format!("{}.{:?}", spec.segment, spec.end);

            // Branch and guarded rules arbitrate with the junction the
            // boundary actually sits on.
            let check_junction = |name: &str| -> Result<JunctionId, TopologyError> {
                let id = lookup_junction(name, &context)?;
                if endpoint_junction.get(&at) != Some(&id) {
                    return Err(TopologyError::BoundaryNotOnJunction {
                        segment: spec.segment.clone(),
                        end: spec.end,
                        junction: name.to_string(),
                    });
                }
                Ok(id)
            };
            let check_path = |junction: JunctionId, path: usize| -> Result<(), TopologyError> {
                let j = &junctions[junction.index()];
                if path >= j.paths.len() {
                    return Err(TopologyError::PathOutOfRange {
                        junction: j.name.clone(),
                        path,
                        paths: j.paths.len(),
                        context: context.clone(),
                    });
                }
                Ok(())
            };

            let rule = match &spec.rule {
                RuleSpec::Fade => ContinuationRule::Fade,
                RuleSpec::PassThrough { segment, end } => ContinuationRule::PassThrough {
                    target: resolve_path(
                        &PathSpec {
                            segment: segment.clone(),
                            end: *end,
                        },
                        &context,
                    )?,
                },
                RuleSpec::Branch {
                    junction,
                    candidates,
                } => {
                    let junction = check_junction(junction)?;
                    let mut resolved = Vec::with_capacity(candidates.len());
                    for c in candidates {
                        check_path(junction, c.path)?;
                        resolved.push(Candidate {
                            path: c.path,
                            weight: b.weight(&c.weight),
                        });
                    }
                    ContinuationRule::Branch {
                        junction,
                        candidates: resolved,
                    }
                }
                RuleSpec::Guarded {
                    junction,
                    condition,
                    then,
                    otherwise,
                } => {
                    let junction = check_junction(junction)?;
                    check_path(junction, *then)?;
                    let otherwise = match *otherwise {
                        FallbackSpec::Fade => Fallback::Fade,
                        FallbackSpec::Path(p) => {
                            check_path(junction, p)?;
                            Fallback::Path(p)
                        }
                    };
                    ContinuationRule::Guarded {
                        junction,
                        condition: b.condition(condition),
                        then: *then,
                        otherwise,
                    }
                }
            };
            if rules.insert(at, rule).is_some() {
                return Err(TopologyError::DuplicateRule {
                    segment: spec.segment.clone(),
                    end: spec.end,
                });
            }
        }

        // Sources.
        let mut sources = Vec::with_capacity(desc.sources.len());
        for spec in &desc.sources {
            let source = match spec {
                SourceSpec::Boundary { segment } | SourceSpec::Generator { segment } => {
                    let id = segment_index.get(segment).copied().ok_or_else(|| {
                        TopologyError::UnknownSegment {
                            name: segment.clone(),
                            context: "sources".into(),
                        }
                    })?;
                    if matches!(spec, SourceSpec::Boundary { .. }) {
                        Source::Boundary { segment: id }
                    } else {
                        Source::Generator { segment: id }
                    }
                }
                SourceSpec::LocalGeneration {
                    load,
                    flow,
                    junction,
                } => Source::LocalGeneration {
                    load: b.intern(load),
                    flow: b.intern(flow),
                    junction: lookup_junction(junction, "sources")?,
                },
            };
            sources.push(source);
        }

        let topology = Topology {
            points,
            positions,
            segments,
            junctions,
            channels: b.channels,
            channel_index: b.channel_index,
            segment_index,
            junction_index,
            rules,
            sources,
            segments_at,
            endpoint_junction,
        };

        for boundary in topology.unruled_boundaries() {
            warn!(
                segment = %topology.segments[boundary.segment.index()].name,
                end = ?boundary.end,
                "boundary has no continuation rule; tokens reaching it are dropped"
            );
        }
        info!(
            points = topology.points.len(),
            segments = topology.segments.len(),
            junctions = topology.junctions.len(),
            channels = topology.channels.len(),
            "topology built"
        );
        Ok(topology)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All declared points, ascending. This is the snapshot enumeration order.
    pub fn points(&self) -> &[PointId] {
        &self.points
    }

    pub fn contains_point(&self, point: PointId) -> bool {
        self.points.binary_search(&point).is_ok()
    }

    /// Segments passing through `point`.
    pub fn segments_at(&self, point: PointId) -> &[SegmentId] {
        self.segments_at
            .get(&point)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The junction the given segment endpoint belongs to, if any.
    pub fn junction_for(&self, segment: SegmentId, end: End) -> Option<JunctionId> {
        self.endpoint_junction
            .get(&Boundary::new(segment, end))
            .copied()
    }

    /// The other endpoints meeting at the boundary a token reaches when
    /// travelling `direction` along `segment`.
    pub fn neighbors(&self, segment: SegmentId, direction: Direction) -> Vec<Boundary> {
        let here = Boundary::new(segment, direction.end_reached());
        match self.endpoint_junction.get(&here) {
            Some(j) => self.junctions[j.index()]
                .endpoints()
                .filter(|b| *b != here)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Continuation rule for tokens arriving at `boundary`.
    pub fn rule(&self, boundary: Boundary) -> Option<&ContinuationRule> {
        self.rules.get(&boundary)
    }

    /// Segment endpoints with no continuation rule.
    pub fn unruled_boundaries(&self) -> Vec<Boundary> {
        let mut out = Vec::new();
        for i in 0..self.segments.len() {
            for end in [End::Head, End::Tail] {
                let b = Boundary::new(SegmentId(i as u32), end);
                if !self.rules.contains_key(&b) {
                    out.push(b);
                }
            }
        }
        out
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.index())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_id(&self, name: &str) -> Option<SegmentId> {
        self.segment_index.get(name).copied()
    }

    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(id.index())
    }

    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    pub fn junction_id(&self, name: &str) -> Option<JunctionId> {
        self.junction_index.get(name).copied()
    }

    pub fn channel_id(&self, name: &str) -> Option<ChannelId> {
        self.channel_index.get(name).copied()
    }

    pub fn channel_name(&self, id: ChannelId) -> Option<&str> {
        self.channels.get(id.index()).map(String::as_str)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn position(&self, point: PointId) -> Option<(f32, f32)> {
        self.positions.get(&point).copied()
    }

    /// Length of the span between two points of a segment. Spans without
    /// positions for both points (or with coincident positions) have length 1.
    pub fn span_length(&self, segment: SegmentId, from_index: usize, to_index: usize) -> f64 {
        let Some(seg) = self.segment(segment) else {
            return 1.0;
        };
        let (Some(a), Some(b)) = (seg.point(from_index), seg.point(to_index)) else {
            return 1.0;
        };
        match (self.position(a), self.position(b)) {
            (Some((ax, ay)), Some((bx, by))) => {
                let dx = f64::from(bx) - f64::from(ax);
                let dy = f64::from(by) - f64::from(ay);
                let len = (dx * dx + dy * dy).sqrt();
                if len.is_finite() && len > 1e-9 { len } else { 1.0 }
            }
            _ => 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Channel interning
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Builder {
    channels: Vec<String>,
    channel_index: HashMap<String, ChannelId>,
}

impl Builder {
    fn intern(&mut self, name: &str) -> ChannelId {
        if let Some(&id) = self.channel_index.get(name) {
            return id;
        }
        let id = ChannelId(self.channels.len() as u32);
        self.channels.push(name.to_string());
        self.channel_index.insert(name.to_string(), id);
        id
    }

    fn weight(&mut self, spec: &WeightSpec) -> WeightRule {
        match spec {
            WeightSpec::SegmentFlow => WeightRule::SegmentFlow,
            WeightSpec::Channel(ch) => WeightRule::Channel(self.intern(ch)),
            WeightSpec::GatedByLoad { flow, load } => WeightRule::GatedByLoad {
                flow: self.intern(flow),
                load: self.intern(load),
            },
            WeightSpec::Dominant { flow, over } => WeightRule::Dominant {
                flow: self.intern(flow),
                over: over.iter().map(|ch| self.intern(ch)).collect(),
            },
            WeightSpec::Above(ch) => WeightRule::Above(self.intern(ch)),
            WeightSpec::Constant(c) => WeightRule::Constant(*c),
        }
    }

    fn condition(&mut self, spec: &ConditionSpec) -> Condition {
        match spec {
            ConditionSpec::Above(ch) => Condition::Above(self.intern(ch)),
            ConditionSpec::Exceeds(a, b) => Condition::Exceeds(self.intern(a), self.intern(b)),
        }
    }
}
