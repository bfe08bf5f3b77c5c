//! Wiring and engine configuration from data files.
//!
//! A data directory holds `wiring.{ron,toml,json}` and optionally
//! `engine.{ron,toml,json}`; the extension picks the parser.

use std::path::{Path, PathBuf};

use gridflow_core::config::{ConfigError, EngineConfig};
use gridflow_core::engine::FlowEngine;
use gridflow_core::topology::{Topology, TopologyError};
use gridflow_core::wiring::WiringDescription;
use serde::de::DeserializeOwned;
use tracing::info;

/// Base name of the wiring description in a data directory.
pub const WIRING_FILE: &str = "wiring";
/// Base name of the optional engine configuration in a data directory.
pub const ENGINE_FILE: &str = "engine";

/// Why a wiring or engine file could not be turned into engine input.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// `wiring.*` is absent from the data directory.
    #[error("no '{file}.{{ron,toml,json}}' in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("{file}: expected a .ron, .toml or .json extension")]
    UnsupportedFormat { file: PathBuf },

    /// The same base name exists in more than one format.
    #[error("ambiguous data file: both {a} and {b} exist")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("{file} could not be parsed: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// Parsed, but not a consistent grid.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Parsed, but holds an out-of-range tunable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// File formats accepted for wiring and engine data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const ALL: [(Format, &'static str); 3] = [
        (Format::Ron, "ron"),
        (Format::Toml, "toml"),
        (Format::Json, "json"),
    ];

    /// Format for a path, judged by its extension alone.
    pub fn of(path: &Path) -> Result<Format, DataLoadError> {
        let ext = path.extension().and_then(|e| e.to_str());
        Self::ALL
            .iter()
            .find(|(_, e)| Some(*e) == ext)
            .map(|(f, _)| *f)
            .ok_or_else(|| DataLoadError::UnsupportedFormat {
                file: path.to_path_buf(),
            })
    }
}

/// Shorthand for [`Format::of`].
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    Format::of(path)
}

/// Locate `{base_name}.ron|toml|json` in `dir`.
///
/// `Ok(None)` when none exists; more than one is an error rather than a
/// silent preference.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = Format::ALL
        .iter()
        .map(|(_, ext)| dir.join(format!("{base_name}.{ext}")))
        .filter(|path| path.is_file());
    let first = present.next();
    if let (Some(a), Some(b)) = (&first, present.next()) {
        return Err(DataLoadError::ConflictingFormats {
            a: a.clone(),
            b: b.clone(),
        });
    }
    Ok(first)
}

/// [`find_data_file`] for files the directory cannot do without.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    match find_data_file(dir, base_name)? {
        Some(path) => Ok(path),
        None => Err(DataLoadError::MissingRequired {
            file: base_name.to_string(),
            dir: dir.to_path_buf(),
        }),
    }
}

/// Parse `content` as `format`. `origin` is only used in error messages.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    origin: &Path,
) -> Result<T, DataLoadError> {
    let detail = match format {
        Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    };
    detail.map_err(|detail| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    })
}

pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = Format::of(path)?;
    deserialize_str(&std::fs::read_to_string(path)?, format, path)
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load and build the topology described by a wiring file.
pub fn load_wiring(path: &Path) -> Result<Topology, DataLoadError> {
    let desc: WiringDescription = deserialize_file(path)?;
    let topology = Topology::build(&desc)?;
    info!(file = %path.display(), segments = topology.segments().len(), "wiring loaded");
    Ok(topology)
}

/// Load and validate an engine configuration file.
pub fn load_config(path: &Path) -> Result<EngineConfig, DataLoadError> {
    let config: EngineConfig = deserialize_file(path)?;
    config.validate()?;
    info!(file = %path.display(), "engine config loaded");
    Ok(config)
}

/// Load a data directory: a required `wiring.*` and an optional `engine.*`
/// (defaults when absent).
pub fn load_dir(dir: &Path) -> Result<(Topology, EngineConfig), DataLoadError> {
    let topology = load_wiring(&require_data_file(dir, WIRING_FILE)?)?;
    let config = match find_data_file(dir, ENGINE_FILE)? {
        Some(path) => load_config(&path)?,
        None => EngineConfig::default(),
    };
    Ok((topology, config))
}

/// Load a data directory straight into a ready engine.
pub fn load_engine(dir: &Path) -> Result<FlowEngine, DataLoadError> {
    let (topology, config) = load_dir(dir)?;
    Ok(FlowEngine::new(topology, config)?)
}

// ===========================================================================
// Tests
// ===========================================================================
