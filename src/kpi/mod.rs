//! KPI engine — compliance scoring, period aggregates and 7-day trends.
//!
//! Three layers of derived data, all recomputed rather than mutated:
//!
//! 1. [`KpiSnapshot`] — point-in-time compliance for one reading.
//! 2. [`PeriodKpi`] — statistical rollup over N hours of readings.
//! 3. [`TrendSummary`] — 7-day moving averages and trend directions
//!    over the stored rollups.
//!
//! The rule engine consumes all three; the storage collaborator owns
//! persistence of the rollups.

pub mod stats;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use stats::TrendDirection;

use crate::app::ports::ActionRecord;
use crate::config::Targets;
use crate::error::HistoryError;
use crate::reading::SensorReading;
use stats::{classify_trend, in_spec_percentage, in_spec_score, mean, sample_stdev};

// ---------------------------------------------------------------------------
// Health-score weights
// ---------------------------------------------------------------------------

/// Weight of each parameter in the composite health score. pH dominates
/// because it gates nutrient uptake; CO2 matters least for basic growth.
/// The five weights sum to exactly 1.0.
pub const WEIGHT_PH: f64 = 0.30;
pub const WEIGHT_EC: f64 = 0.25;
pub const WEIGHT_TEMP: f64 = 0.20;
pub const WEIGHT_HUMIDITY: f64 = 0.15;
pub const WEIGHT_CO2: f64 = 0.10;

// ---------------------------------------------------------------------------
// Current KPIs
// ---------------------------------------------------------------------------

/// Point-in-time compliance snapshot, recomputed every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub timestamp: DateTime<Utc>,

    /// Per-parameter compliance scores, each in [0, 1].
    pub ph_in_spec: f64,
    pub ec_in_spec: f64,
    pub temp_in_spec: f64,
    pub humidity_in_spec: f64,
    pub co2_in_spec: f64,

    /// Weighted composite of the five scores, in [0, 1].
    pub health_score: f64,

    /// Raw values the scores were computed from.
    pub ph_value: Option<f64>,
    pub ec_value: Option<f64>,
    pub temp_value: Option<f64>,
    pub humidity_value: Option<f64>,
    pub co2_value: Option<f64>,

    /// Dosing executed in the trailing 24 hours.
    pub dosing_24h: DosingTotals,

    pub days_since_reservoir_change: u32,
}

/// Summed successful dosing volumes per pump.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DosingTotals {
    pub pump_a_ml: f64,
    pub pump_b_ml: f64,
    pub ph_pump_ml: f64,
    pub total_ml: f64,
}

impl DosingTotals {
    /// Sum volumes from an action history. Only successful actions
    /// count — a failed dose never entered the reservoir.
    pub fn from_records(records: &[ActionRecord]) -> Self {
        let mut totals = Self::default();
        for record in records.iter().filter(|r| r.success) {
            totals.pump_a_ml += record.pump_a_ml;
            totals.pump_b_ml += record.pump_b_ml;
            totals.ph_pump_ml += record.ph_pump_ml;
        }
        totals.total_ml = totals.pump_a_ml + totals.pump_b_ml + totals.ph_pump_ml;
        totals
    }
}

// ---------------------------------------------------------------------------
// Period rollups
// ---------------------------------------------------------------------------

/// The standard rollup window set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodLabel {
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "6hour")]
    SixHour,
    #[serde(rename = "24hour")]
    Day,
    #[serde(rename = "7day")]
    Week,
}

impl PeriodLabel {
    /// All rollup windows, shortest first.
    pub const ALL: [PeriodLabel; 4] = [
        PeriodLabel::OneHour,
        PeriodLabel::SixHour,
        PeriodLabel::Day,
        PeriodLabel::Week,
    ];

    pub fn hours(self) -> u32 {
        match self {
            Self::OneHour => 1,
            Self::SixHour => 6,
            Self::Day => 24,
            Self::Week => 168,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneHour => "1hour",
            Self::SixHour => "6hour",
            Self::Day => "24hour",
            Self::Week => "7day",
        }
    }
}

/// Descriptive statistics for one parameter over a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub stdev: f64,
    pub in_spec_pct: f64,
}

/// Aggregate KPIs over one rollup window. Persisted by the storage
/// collaborator as a rollup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodKpi {
    pub timestamp: DateTime<Utc>,
    pub period: PeriodLabel,
    pub reading_count: usize,

    /// Per-parameter stats; absent when no reading carried the field.
    pub ph: Option<ParamStats>,
    pub ec: Option<ParamStats>,
    pub temp: Option<ParamStats>,
    pub humidity: Option<ParamStats>,
    pub co2: Option<ParamStats>,

    /// Mean health score over readings with complete data, binary
    /// in-range scoring per parameter. Absent when no reading was
    /// complete.
    pub health_score: Option<f64>,

    pub dosing: DosingTotals,
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

/// 7-day moving averages and trend directions over the stored rollups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub data_points: usize,

    pub ph_7day_avg: Option<f64>,
    pub ph_trend: Option<TrendDirection>,
    /// Mean 7-day pH in-spec percentage; rollups without pH data count
    /// as 0, so patchy history reads as poor compliance, not good.
    pub ph_in_spec_7day: Option<f64>,

    pub ec_7day_avg: Option<f64>,
    pub ec_trend: Option<TrendDirection>,
    pub ec_in_spec_7day: Option<f64>,

    pub health_7day_avg: Option<f64>,
    pub health_trend: Option<TrendDirection>,

    pub ml_total_7day: f64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless KPI calculator. All history arrives as arguments; the
/// engine never touches storage itself.
#[derive(Debug, Default)]
pub struct KpiEngine;

impl KpiEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score one reading against the configured targets.
    pub fn current_kpis(
        &self,
        reading: &SensorReading,
        targets: &Targets,
        dosing_24h: DosingTotals,
        days_since_reservoir_change: u32,
    ) -> KpiSnapshot {
        let ph_in_spec = in_spec_score(reading.water.ph, targets.ph.min, targets.ph.max);
        let ec_in_spec = in_spec_score(reading.water.ec, targets.ec.min, targets.ec.max);
        let temp_in_spec =
            in_spec_score(reading.air.temperature, targets.temp.min, targets.temp.max);
        let humidity_in_spec = in_spec_score(
            reading.air.humidity,
            targets.humidity.min,
            targets.humidity.max,
        );
        let co2_in_spec = in_spec_score(reading.air.co2, targets.co2.min, targets.co2.max);

        let health_score = ph_in_spec * WEIGHT_PH
            + ec_in_spec * WEIGHT_EC
            + temp_in_spec * WEIGHT_TEMP
            + humidity_in_spec * WEIGHT_HUMIDITY
            + co2_in_spec * WEIGHT_CO2;

        KpiSnapshot {
            timestamp: reading.timestamp,
            ph_in_spec,
            ec_in_spec,
            temp_in_spec,
            humidity_in_spec,
            co2_in_spec,
            health_score,
            ph_value: reading.water.ph,
            ec_value: reading.water.ec,
            temp_value: reading.air.temperature,
            humidity_value: reading.air.humidity,
            co2_value: reading.air.co2,
            dosing_24h,
            days_since_reservoir_change,
        }
    }

    /// Aggregate KPIs over a window of stored readings and actions.
    /// Requires at least one reading.
    pub fn period_kpis(
        &self,
        readings: &[SensorReading],
        actions: &[ActionRecord],
        targets: &Targets,
        period: PeriodLabel,
    ) -> Result<PeriodKpi, HistoryError> {
        if readings.is_empty() {
            return Err(HistoryError::NoData);
        }

        let timestamp = readings
            .iter()
            .map(|r| r.timestamp)
            .max()
            .unwrap_or_else(Utc::now);

        let ph_values: Vec<f64> = readings.iter().filter_map(|r| r.water.ph).collect();
        let ec_values: Vec<f64> = readings.iter().filter_map(|r| r.water.ec).collect();
        let temp_values: Vec<f64> = readings.iter().filter_map(|r| r.air.temperature).collect();
        let humidity_values: Vec<f64> = readings.iter().filter_map(|r| r.air.humidity).collect();
        let co2_values: Vec<f64> = readings.iter().filter_map(|r| r.air.co2).collect();

        // Mean health over readings with complete data, binary scoring:
        // a period is judged on whether each sample sat inside its band,
        // not on how far outside it strayed.
        let mut health_scores = Vec::new();
        for r in readings {
            let (Some(ph), Some(ec), Some(temp), Some(humidity), Some(co2)) = (
                r.water.ph,
                r.water.ec,
                r.air.temperature,
                r.air.humidity,
                r.air.co2,
            ) else {
                continue;
            };
            let binary = |v: f64, range: crate::config::TargetRange| {
                if range.min <= v && v <= range.max { 1.0 } else { 0.0 }
            };
            health_scores.push(
                binary(ph, targets.ph) * WEIGHT_PH
                    + binary(ec, targets.ec) * WEIGHT_EC
                    + binary(temp, targets.temp) * WEIGHT_TEMP
                    + binary(humidity, targets.humidity) * WEIGHT_HUMIDITY
                    + binary(co2, targets.co2) * WEIGHT_CO2,
            );
        }

        Ok(PeriodKpi {
            timestamp,
            period,
            reading_count: readings.len(),
            ph: param_stats(&ph_values, targets.ph.min, targets.ph.max),
            ec: param_stats(&ec_values, targets.ec.min, targets.ec.max),
            temp: param_stats(&temp_values, targets.temp.min, targets.temp.max),
            humidity: param_stats(&humidity_values, targets.humidity.min, targets.humidity.max),
            co2: param_stats(&co2_values, targets.co2.min, targets.co2.max),
            health_score: mean(&health_scores),
            dosing: DosingTotals::from_records(actions),
        })
    }

    /// 7-day moving averages and trend directions from stored rollups.
    /// Requires at least two rollup points.
    pub fn trends(&self, rollups: &[PeriodKpi]) -> Result<TrendSummary, HistoryError> {
        if rollups.len() < 2 {
            return Err(HistoryError::InsufficientPoints {
                needed: 2,
                have: rollups.len(),
            });
        }

        let ph_values: Vec<f64> = rollups.iter().filter_map(|k| k.ph.map(|s| s.avg)).collect();
        let ec_values: Vec<f64> = rollups.iter().filter_map(|k| k.ec.map(|s| s.avg)).collect();
        let health_values: Vec<f64> = rollups.iter().filter_map(|k| k.health_score).collect();

        // In-spec averages count every rollup; a rollup missing the
        // parameter contributes 0 rather than being skipped.
        let ph_in_spec: Vec<f64> = rollups
            .iter()
            .map(|k| k.ph.map_or(0.0, |s| s.in_spec_pct))
            .collect();
        let ec_in_spec: Vec<f64> = rollups
            .iter()
            .map(|k| k.ec.map_or(0.0, |s| s.in_spec_pct))
            .collect();

        Ok(TrendSummary {
            data_points: rollups.len(),
            ph_7day_avg: mean(&ph_values),
            ph_trend: (!ph_values.is_empty()).then(|| classify_trend(&ph_values)),
            ph_in_spec_7day: (!ph_values.is_empty()).then(|| mean(&ph_in_spec).unwrap_or(0.0)),
            ec_7day_avg: mean(&ec_values),
            ec_trend: (!ec_values.is_empty()).then(|| classify_trend(&ec_values)),
            ec_in_spec_7day: (!ec_values.is_empty()).then(|| mean(&ec_in_spec).unwrap_or(0.0)),
            health_7day_avg: mean(&health_values),
            health_trend: (!health_values.is_empty()).then(|| classify_trend(&health_values)),
            ml_total_7day: rollups.iter().map(|k| k.dosing.total_ml).sum(),
        })
    }
}

fn param_stats(values: &[f64], min: f64, max: f64) -> Option<ParamStats> {
    let avg = mean(values)?;
    Some(ParamStats {
        avg,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        stdev: sample_stdev(values),
        in_spec_pct: in_spec_percentage(values, min, max),
    })
}
