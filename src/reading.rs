//! Sensor reading snapshot.
//!
//! One immutable snapshot per poll cycle. Every physical field is an
//! `Option` because the sensor interface is allowed to return partial
//! data on hardware fault — absence is explicit, never a sentinel
//! value. The KPI engine and rule engine consume the snapshot
//! read-only; the storage collaborator persists it; then it is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of every sensor group in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub water: WaterReading,
    pub air: AirReading,
    pub root: RootReading,
    pub light: LightReading,
}

/// Reservoir water chemistry and level.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WaterReading {
    /// pH of the nutrient solution.
    pub ph: Option<f64>,
    /// Electrical conductivity (mS/cm) — proxy for nutrient concentration.
    pub ec: Option<f64>,
    /// Water temperature (°C).
    pub temperature: Option<f64>,
    /// Turbidity (NTU).
    pub turbidity: Option<f64>,
    /// Upper float switch: `true` = water at or above the high mark.
    pub level_high: Option<bool>,
    /// Lower float switch: `true` = water at or above the low mark.
    pub level_low: Option<bool>,
}

/// Air environment around the canopy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AirReading {
    /// Air temperature (°C).
    pub temperature: Option<f64>,
    /// Relative humidity (%).
    pub humidity: Option<f64>,
    /// Barometric pressure (hPa).
    pub pressure: Option<f64>,
    /// CO2 concentration (ppm).
    pub co2: Option<f64>,
}

/// Root-zone conditions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RootReading {
    /// Root-zone temperature (°C).
    pub temperature: Option<f64>,
}

/// Light conditions and current LED drive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LightReading {
    /// Ambient light level (lux).
    pub lux: Option<f64>,
    /// Current LED drive power (0–100%).
    pub led_power: Option<u8>,
}

impl SensorReading {
    /// An empty reading (all fields absent) at the given time. Mostly
    /// useful as a starting point in tests and the mock rig.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            water: WaterReading::default(),
            air: AirReading::default(),
            root: RootReading::default(),
            light: LightReading::default(),
        }
    }
}
