use serde::{Deserialize, Serialize};

/// Invalid engine configuration value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("`{field}` must be finite and non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("`jitter` must be within [0, 1], got {0}")]
    JitterOutOfRange(f64),
    #[error("`max_hops` must be at least 1")]
    ZeroHops,
    #[error("`spawn_limit` must be at least 1")]
    ZeroSpawnLimit,
}

/// Tunables of the flow animation engine. Every field has a default, so a
/// data file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Gain `K` of the spawn accumulators: emissions per flow unit per second.
    pub emission_gain: f64,
    /// Distance travelled per flow unit per second (before segment scale).
    pub flow_speed: f64,
    /// Flows at or below this are treated as off.
    pub off_threshold: f64,
    /// Seconds from full opacity to removal.
    pub fade_duration: f64,
    /// Upper bound of the relative jitter added at symmetric junctions.
    pub jitter: f64,
    pub seed: u64,
    /// Maximum span hops per token per step.
    pub max_hops: u32,
    /// Opt-in: how many points behind a token's `to` point are also lit
    /// (0..=2). Zero lights only `to`.
    pub trail: usize,
    /// Most tokens one source spawns per step. Emissions past the limit stay
    /// in the accumulator.
    pub spawn_limit: u32,
    /// Initial step driver time scale.
    pub time_scale: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            emission_gain: 2.0,
            flow_speed: 2.0,
            off_threshold: 1e-4,
            fade_duration: 0.5,
            jitter: 0.05,
            seed: 0x6772_6964,
            max_hops: 1024,
            trail: 0,
            spawn_limit: 64,
            time_scale: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("emission_gain", self.emission_gain),
            ("flow_speed", self.flow_speed),
            ("off_threshold", self.off_threshold),
            ("fade_duration", self.fade_duration),
            ("time_scale", self.time_scale),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::JitterOutOfRange(self.jitter));
        }
        if self.max_hops == 0 {
            return Err(ConfigError::ZeroHops);
        }
        if self.spawn_limit == 0 {
            return Err(ConfigError::ZeroSpawnLimit);
        }
        Ok(())
    }
}
