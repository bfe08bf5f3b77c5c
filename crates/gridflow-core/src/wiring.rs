//! Serializable wiring description: the data a [`Topology`](crate::topology::Topology)
//! is built from.
//!
//! Everything is referenced by name so the description can live in a data
//! file. Names are resolved (and the description validated) by
//! [`Topology::build`](crate::topology::Topology::build).

use serde::{Deserialize, Serialize};

use crate::topology::{End, JunctionKind};

/// Top-level wiring description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WiringDescription {
    /// Individually declared point ids.
    #[serde(default)]
    pub points: Vec<u32>,
    /// Inclusive ranges of point ids, for long contiguous runs.
    #[serde(default)]
    pub point_ranges: Vec<PointRange>,
    /// Optional screen/model positions; spans without both positions have length 1.
    #[serde(default)]
    pub positions: Vec<PointPosition>,
    #[serde(default)]
    pub segments: Vec<SegmentSpec>,
    #[serde(default)]
    pub junctions: Vec<JunctionSpec>,
    #[serde(default)]
    pub boundaries: Vec<BoundarySpec>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRange {
    pub first: u32,
    pub last: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPosition {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

/// One conductor run: an ordered list of points with a flow binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub name: String,
    pub points: Vec<u32>,
    pub flow: FlowBinding,
    /// Converts flow units into advance speed.
    #[serde(default = "default_unit")]
    pub scale: f64,
}

/// Where a segment's flow comes from in each solver reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowBinding {
    /// Solver channel name.
    pub channel: String,
    /// Constant fraction of the channel carried by this segment.
    #[serde(default = "default_unit")]
    pub share: f64,
    /// Divide by the reading's `capacity` aggregate (generator feeds).
    #[serde(default)]
    pub per_capacity: bool,
}

fn default_unit() -> f64 {
    1.0
}

/// A segment endpoint, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSpec {
    pub segment: String,
    pub end: End,
}

/// A named junction. `paths` (2 or 3) are the arbitrated choices; `feeders`
/// are further endpoints that meet here without being chosen between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionSpec {
    pub name: String,
    #[serde(default)]
    pub kind: JunctionKind,
    /// Jitter equal weights at this junction.
    #[serde(default)]
    pub symmetric: bool,
    pub paths: Vec<PathSpec>,
    #[serde(default)]
    pub feeders: Vec<PathSpec>,
}

/// Continuation rule for tokens arriving at one segment endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySpec {
    pub segment: String,
    pub end: End,
    pub rule: RuleSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleSpec {
    Fade,
    PassThrough {
        segment: String,
        end: End,
    },
    Branch {
        junction: String,
        candidates: Vec<CandidateSpec>,
    },
    Guarded {
        junction: String,
        condition: ConditionSpec,
        then: usize,
        otherwise: FallbackSpec,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub path: usize,
    pub weight: WeightSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightSpec {
    SegmentFlow,
    Channel(String),
    GatedByLoad { flow: String, load: String },
    Dominant { flow: String, over: Vec<String> },
    Above(String),
    Constant(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionSpec {
    Above(String),
    Exceeds(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackSpec {
    Fade,
    Path(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceSpec {
    /// Network boundary feed; qualifying share derived from the renewable aggregate.
    Boundary { segment: String },
    /// Dedicated renewable generator feed; every emission qualifies.
    Generator { segment: String },
    /// Local generation at a load whose value has gone negative.
    LocalGeneration {
        load: String,
        flow: String,
        junction: String,
    },
}
