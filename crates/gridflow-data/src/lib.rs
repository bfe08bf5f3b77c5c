pub mod exhibit;
pub mod loader;

pub use exhibit::{EXHIBIT_POINT_COUNT, exhibit_engine, exhibit_topology, exhibit_wiring};
pub use loader::{DataLoadError, load_config, load_dir, load_engine, load_wiring};
