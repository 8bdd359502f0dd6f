//! Runtime configuration
//!
//! Loaded once at process start from a TOML file (or built in code for
//! tests); immutable for the lifetime of a run.

use crate::error::ConfigError;
use crate::types::ComplianceScore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Control-plane configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemedyConfig {
    /// H0 hard floor for the compliance index (0-100)
    pub h0_floor: f64,
    /// Plan horizon: maximum steps per candidate plan
    pub horizon: usize,
    /// Control-loop tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Per-source telemetry fetch timeout in milliseconds
    pub telemetry_timeout_ms: u64,
    /// Snapshots retained for trend analysis
    pub snapshot_history: usize,
    /// Consecutive failures of one action before escalating to Paused
    pub max_action_failures: u32,
    /// Rollback snapshots retained per target after supersession
    pub snapshot_retention: usize,
    /// Shadow mirror queue depth (overflow is dropped)
    pub mirror_queue_depth: usize,
    /// Planner wall-clock budget in milliseconds
    pub planner_budget_ms: u64,
}

impl Default for RemedyConfig {
    fn default() -> Self {
        Self {
            h0_floor: 95.0,
            horizon: 3,
            tick_interval_ms: 5_000,
            telemetry_timeout_ms: 500,
            snapshot_history: 32,
            max_action_failures: 3,
            snapshot_retention: 8,
            mirror_queue_depth: 256,
            planner_budget_ms: 1_000,
        }
    }
}

impl RemedyConfig {
    /// Create the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different H0 floor
    #[inline]
    #[must_use]
    pub fn with_h0_floor(mut self, floor: f64) -> Self {
        self.h0_floor = floor;
        self
    }

    /// With a different horizon
    #[inline]
    #[must_use]
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field ranges. Called by [`RemedyConfig::load`]; test-built
    /// configs should call it explicitly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.h0_floor) {
            return Err(ConfigError::FloorOutOfRange(self.h0_floor));
        }
        if self.horizon == 0 {
            return Err(ConfigError::EmptyHorizon);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "tick_interval_ms",
            });
        }
        if self.telemetry_timeout_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "telemetry_timeout_ms",
            });
        }
        if self.planner_budget_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "planner_budget_ms",
            });
        }
        Ok(())
    }

    /// H0 floor as a typed score.
    #[inline]
    #[must_use]
    pub fn floor(&self) -> ComplianceScore {
        ComplianceScore::new(self.h0_floor)
    }

    /// Tick interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Per-source telemetry timeout as a [`Duration`].
    #[inline]
    #[must_use]
    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_timeout_ms)
    }

    /// Planner budget as a [`Duration`].
    #[inline]
    #[must_use]
    pub fn planner_budget(&self) -> Duration {
        Duration::from_millis(self.planner_budget_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_validates() {
        assert!(RemedyConfig::default().validate().is_ok());
    }

    #[test]
    fn floor_out_of_range_rejected() {
        let config = RemedyConfig::default().with_h0_floor(101.0);
        assert_eq!(config.validate(), Err(ConfigError::FloorOutOfRange(101.0)));
    }

    #[test]
    fn zero_horizon_rejected() {
        let config = RemedyConfig::default().with_horizon(0);
        assert_eq!(config.validate(), Err(ConfigError::EmptyHorizon));
    }

    #[test]
    fn zero_tick_interval_rejected() {
        let config = RemedyConfig {
            tick_interval_ms: 0,
            ..RemedyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval {
                field: "tick_interval_ms"
            })
        ));
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
h0_floor = 90.0
horizon = 2
tick_interval_ms = 1000
telemetry_timeout_ms = 200
snapshot_history = 16
max_action_failures = 2
snapshot_retention = 4
mirror_queue_depth = 64
planner_budget_ms = 500
"#
        )
        .unwrap();

        let config = RemedyConfig::load(file.path()).unwrap();
        assert_eq!(config.h0_floor, 90.0);
        assert_eq!(config.horizon, 2);
        assert_eq!(config.floor().value(), 90.0);
    }

    #[test]
    fn load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "h0_floor = 400.0\n").unwrap();
        assert!(RemedyConfig::load(file.path()).is_err());
    }
}
