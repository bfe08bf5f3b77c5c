//! The transition table: what a token does when it reaches a segment end.
//!
//! Rules are keyed by [`Boundary`] (segment + end). Arriving at a tail means
//! the token was travelling forward, arriving at a head means backward, so the
//! key also fixes the direction. Every weight and condition reads the current
//! step's channel values and segment flows through a [`FlowView`].

use crate::id::{ChannelId, JunctionId};
use crate::topology::Boundary;

// ---------------------------------------------------------------------------
// Flow view
// ---------------------------------------------------------------------------

/// Read-only view of the current step's flow state.
#[derive(Debug, Clone, Copy)]
pub struct FlowView<'a> {
    /// Sanitized channel values, indexed by [`ChannelId`].
    pub channels: &'a [f64],
    /// Current segment flows, indexed by segment.
    pub segment_flows: &'a [f64],
    /// Flows at or below this are treated as off.
    pub epsilon: f64,
}

impl FlowView<'_> {
    pub fn channel(&self, id: ChannelId) -> f64 {
        self.channels.get(id.index()).copied().unwrap_or(0.0)
    }

    pub fn segment_flow(&self, boundary: Boundary) -> f64 {
        self.segment_flows
            .get(boundary.segment.index())
            .copied()
            .unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// How a branch candidate's arbitration weight is computed each time a
/// token reaches the junction.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightRule {
    /// The candidate segment's own current flow.
    SegmentFlow,
    /// A raw channel value.
    Channel(ChannelId),
    /// `flow` while the load is positive (consuming), else 0.
    GatedByLoad { flow: ChannelId, load: ChannelId },
    /// `flow` while it covers the sum of `over` (within epsilon), else 0.
    Dominant { flow: ChannelId, over: Vec<ChannelId> },
    /// The channel while it is above epsilon, else 0.
    Above(ChannelId),
    Constant(f64),
}

impl WeightRule {
    /// Evaluate for a candidate entering at `target`. Never negative.
    pub fn evaluate(&self, view: &FlowView<'_>, target: Boundary) -> f64 {
        let w = match self {
            WeightRule::SegmentFlow => view.segment_flow(target),
            WeightRule::Channel(ch) => view.channel(*ch),
            WeightRule::GatedByLoad { flow, load } => {
                if view.channel(*load) > 0.0 {
                    view.channel(*flow)
                } else {
                    0.0
                }
            }
            WeightRule::Dominant { flow, over } => {
                let f = view.channel(*flow);
                let others: f64 = over.iter().map(|ch| view.channel(*ch)).sum();
                if f + view.epsilon >= others { f } else { 0.0 }
            }
            WeightRule::Above(ch) => {
                let v = view.channel(*ch);
                if v > view.epsilon { v } else { 0.0 }
            }
            WeightRule::Constant(c) => *c,
        };
        if w.is_finite() { w.max(0.0) } else { 0.0 }
    }
}

/// Guard for a reverse-eligible merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// The channel carries flow.
    Above(ChannelId),
    /// The first channel carries more than the second.
    Exceeds(ChannelId, ChannelId),
}

impl Condition {
    pub fn holds(&self, view: &FlowView<'_>) -> bool {
        match self {
            Condition::Above(ch) => view.channel(*ch) > view.epsilon,
            Condition::Exceeds(a, b) => view.channel(*a) > view.channel(*b),
        }
    }
}

/// What a guarded merge does when its condition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Fade,
    Path(usize),
}

/// One arbitrated choice at a branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Index into the junction's `paths`.
    pub path: usize,
    pub weight: WeightRule,
}

/// Continuation rule for one boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ContinuationRule {
    /// Dead end or sink: the token fades out here.
    Fade,
    /// Flow continues unambiguously onto a fixed endpoint.
    PassThrough { target: Boundary },
    /// Arbitrate among candidates with the junction's arbiter.
    Branch {
        junction: JunctionId,
        candidates: Vec<Candidate>,
    },
    /// Continue onto `then` while `condition` holds, else `otherwise`.
    Guarded {
        junction: JunctionId,
        condition: Condition,
        then: usize,
        otherwise: Fallback,
    },
}

/// Outcome of resolving a boundary for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Enter the given endpoint (head: travel forward, tail: travel backward).
    Enter(Boundary),
    Fade,
    /// No continuation could be resolved; the token is dropped.
    Stranded,
}
