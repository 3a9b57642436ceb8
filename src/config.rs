//! System configuration parameters.
//!
//! All tunable parameters for the Verdant controller: grow phase,
//! reservoir geometry, per-parameter target ranges, loop intervals and
//! the safety envelope. Loaded once per process from a JSON file (or
//! defaults) and treated as an immutable snapshot for each control
//! cycle.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::safety::SafetyLimits;

// ---------------------------------------------------------------------------
// Grow phase
// ---------------------------------------------------------------------------

/// What the system is currently growing. Drives the reservoir-change
/// cadence and (eventually) phase-specific target presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GrowPhase {
    /// Leafy greens — slower nutrient turnover.
    Greens,
    /// Fruiting crops — heavier feeders, faster reservoir turnover.
    Fruits,
}

impl GrowPhase {
    /// Maximum days between reservoir changes for this phase.
    pub fn reservoir_change_days(self) -> u32 {
        match self {
            Self::Greens => 14,
            Self::Fruits => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Greens => "GREENS",
            Self::Fruits => "FRUITS",
        }
    }
}

// ---------------------------------------------------------------------------
// Target ranges
// ---------------------------------------------------------------------------

/// Acceptable band and preferred setpoint for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
    pub target: f64,
}

impl TargetRange {
    pub fn new(min: f64, max: f64, target: f64) -> Self {
        Self { min, max, target }
    }
}

/// Target ranges for the five scored parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub ph: TargetRange,
    pub ec: TargetRange,
    pub temp: TargetRange,
    pub humidity: TargetRange,
    pub co2: TargetRange,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            ph: TargetRange::new(5.5, 6.5, 6.0),
            ec: TargetRange::new(1.2, 2.0, 1.6),
            temp: TargetRange::new(18.0, 26.0, 22.0),
            humidity: TargetRange::new(50.0, 70.0, 60.0),
            co2: TargetRange::new(400.0, 1200.0, 800.0),
        }
    }
}

// ---------------------------------------------------------------------------
// System configuration
// ---------------------------------------------------------------------------

/// Full controller configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub grow_phase: GrowPhase,
    /// Nutrient reservoir volume in litres — scales every dosing formula.
    pub reservoir_volume_l: f64,
    /// Expected nutrient consumption per week under stable conditions.
    /// The EC-decrease rule compares actual weekly dosing against this.
    pub baseline_dosing_ml_per_week: f64,

    pub targets: Targets,

    /// Sensor poll cadence (seconds).
    pub sensor_poll_interval_s: u32,
    /// Control cycle cadence (seconds).
    pub control_loop_interval_s: u32,

    /// Safety envelope and dosing ceilings.
    pub safety: SafetyLimits,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            grow_phase: GrowPhase::Greens,
            reservoir_volume_l: 20.0,
            baseline_dosing_ml_per_week: 50.0,
            targets: Targets::default(),
            sensor_poll_interval_s: 60,
            control_loop_interval_s: 600,
            safety: SafetyLimits::default(),
        }
    }
}

impl SystemConfig {
    /// Load configuration from a JSON file, validating before returning.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        info!("configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load from a file if one is given and present, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                warn!("config file {} not found, using defaults", p.display());
                Ok(Self::default())
            }
            None => {
                info!("no config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Range validation. Hard errors for inverted ranges; warnings when
    /// targets stray outside the absolute safety envelope.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.targets;

        if t.ph.min >= t.ph.max {
            return Err(ConfigError::ValidationFailed("pH min must be less than pH max"));
        }
        if t.ec.min >= t.ec.max {
            return Err(ConfigError::ValidationFailed("EC min must be less than EC max"));
        }
        if t.temp.min >= t.temp.max {
            return Err(ConfigError::ValidationFailed(
                "temperature min must be less than temperature max",
            ));
        }
        if t.humidity.min >= t.humidity.max {
            return Err(ConfigError::ValidationFailed(
                "humidity min must be less than humidity max",
            ));
        }
        if t.co2.min >= t.co2.max {
            return Err(ConfigError::ValidationFailed("CO2 min must be less than CO2 max"));
        }
        if self.reservoir_volume_l <= 0.0 {
            return Err(ConfigError::ValidationFailed("reservoir volume must be positive"));
        }
        if self.control_loop_interval_s == 0 {
            return Err(ConfigError::ValidationFailed("control loop interval must be non-zero"));
        }

        if t.ph.min < self.safety.ph_min_absolute || t.ph.max > self.safety.ph_max_absolute {
            warn!("pH targets outside typical hydroponic range (4.0-8.0)");
        }
        if t.ec.min < self.safety.ec_min_absolute || t.ec.max > self.safety.ec_max_absolute {
            warn!("EC targets outside typical range (0.5-3.0)");
        }

        Ok(())
    }
}
