//! Gridflow Core -- the flow animation engine for a power-grid LED diorama.
//!
//! Turns a stream of real-valued line flows from an external power-flow
//! solver into (a) a discrete illumination state for every LED on the
//! diorama and (b) a population of moving tokens that travel the grid at a
//! rate proportional to flow, branching, merging, reversing and fading as
//! the flows change.
//!
//! # Step Pipeline
//!
//! Each call to [`driver::StepDriver::advance`] runs one frame:
//!
//! 1. **Poll** -- take the newest [`reading::SolverReading`], if any; keep
//!    the previous values otherwise.
//! 2. **Spawn** -- source segments run their [`accumulator::EmissionAccumulator`]
//!    pair and emit conventional or qualifying tokens.
//! 3. **Travel** -- tokens advance along their segments; at a segment end the
//!    transition table (see [`transition`]) and the junction's
//!    [`arbiter::Arbiter`] pick where they go next.
//! 4. **Retract** -- tokens on segments whose flow has gone off start fading.
//! 5. **Publish** -- a fresh [`snapshot::FlowSnapshot`] is built and swapped
//!    in.
//!
//! # Key Types
//!
//! - [`topology::Topology`] -- Points, segments, junctions and the transition
//!   table, built and validated from a [`wiring::WiringDescription`].
//! - [`engine::FlowEngine`] -- Owns flows, accumulators, arbiters and tokens.
//! - [`driver::StepDriver`] -- Per-frame entry point with time scale and pause.
//! - [`snapshot::FlowSnapshot`] -- Immutable per-point state, with the LED
//!   controller's state codes.
//! - [`config::EngineConfig`] -- Gains, thresholds, fade duration, jitter.

pub mod accumulator;
pub mod arbiter;
pub mod config;
pub mod driver;
pub mod engine;
pub mod id;
pub mod lifecycle;
pub mod reading;
pub mod rng;
pub mod snapshot;
pub mod token;
pub mod topology;
pub mod transition;
pub mod wiring;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
