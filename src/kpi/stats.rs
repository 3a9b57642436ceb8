//! Small statistics helpers for KPI aggregation.
//!
//! Pure functions over value slices — no history access, no state.
//! The compliance-score and trend-slope formulas here are load-bearing:
//! the rule engine's thresholds were tuned against exactly these curves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a metric over a rollup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Stable,
    Increasing,
    Decreasing,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => f.write_str("stable"),
            Self::Increasing => f.write_str("increasing"),
            Self::Decreasing => f.write_str("decreasing"),
        }
    }
}

/// Slopes with magnitude below this dead-band classify as stable.
pub const TREND_DEAD_BAND: f64 = 0.01;

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n−1 denominator); 0 for fewer than two points.
pub fn sample_stdev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Ordinary least-squares slope over the index sequence `0..n`.
/// `None` for fewer than two points.
pub fn ols_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let x_sum: f64 = (0..n).map(|i| i as f64).sum();
    let y_sum: f64 = values.iter().sum();
    let xy_sum: f64 = values.iter().enumerate().map(|(i, v)| i as f64 * v).sum();
    let x2_sum: f64 = (0..n).map(|i| (i * i) as f64).sum();

    Some((nf * xy_sum - x_sum * y_sum) / (nf * x2_sum - x_sum * x_sum))
}

/// Classify a series as stable/increasing/decreasing by its OLS slope
/// against the dead-band. Series too short to have a slope are stable.
pub fn classify_trend(values: &[f64]) -> TrendDirection {
    match ols_slope(values) {
        None => TrendDirection::Stable,
        Some(slope) if slope.abs() < TREND_DEAD_BAND => TrendDirection::Stable,
        Some(slope) if slope > 0.0 => TrendDirection::Increasing,
        Some(_) => TrendDirection::Decreasing,
    }
}

/// Percentage of values inside `[min, max]` (inclusive). 0 for an
/// empty slice.
pub fn in_spec_percentage(values: &[f64], min: f64, max: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let in_spec = values.iter().filter(|v| min <= **v && **v <= max).count();
    (in_spec as f64 / values.len() as f64) * 100.0
}

/// Point-in-time compliance score for one parameter.
///
/// 1.0 inside `[min, max]`; outside, the score decays linearly with the
/// *relative* deviation — a 50% relative deviation drives the score to
/// zero — and is floored at 0. A missing value scores 0.
pub fn in_spec_score(value: Option<f64>, min: f64, max: f64) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };

    if min <= value && value <= max {
        return 1.0;
    }

    let deviation = if value < min {
        (min - value) / min
    } else {
        (value - max) / max
    };

    (1.0 - deviation * 2.0).max(0.0)
}
