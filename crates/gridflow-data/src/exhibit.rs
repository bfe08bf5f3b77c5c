//! The wiring of the physical diorama, bundled with the crate.

use std::path::Path;

use gridflow_core::config::EngineConfig;
use gridflow_core::engine::FlowEngine;
use gridflow_core::topology::Topology;
use gridflow_core::wiring::WiringDescription;

use crate::loader::{DataLoadError, Format, deserialize_str};

const EXHIBIT_RON: &str = include_str!("../data/exhibit.ron");

/// Addressable LEDs on the diorama.
pub const EXHIBIT_POINT_COUNT: usize = 177;

/// Parse the bundled wiring description.
pub fn exhibit_wiring() -> Result<WiringDescription, DataLoadError> {
    deserialize_str(EXHIBIT_RON, Format::Ron, Path::new("exhibit.ron"))
}

pub fn exhibit_topology() -> Result<Topology, DataLoadError> {
    Ok(Topology::build(&exhibit_wiring()?)?)
}

/// An engine over the exhibit wiring with the given configuration.
pub fn exhibit_engine(config: EngineConfig) -> Result<FlowEngine, DataLoadError> {
    Ok(FlowEngine::new(exhibit_topology()?, config)?)
}
