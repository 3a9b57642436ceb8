//! Freeze and rollback gates.
//!
//! Both gates run before any adjustment rule, every cycle, and both are
//! pure functions of the current KPIs/trends — neither holds state
//! between cycles. Rollback is evaluated first and wins if both would
//! somehow hold.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::kpi::{KpiSnapshot, TrendSummary};

// Gate thresholds. Tunable constants inherited from the field-tuned
// deployment, not derived physics.

/// Health score below which the last config change is presumed harmful.
/// Exclusive bound: exactly 0.6 does not trigger.
pub const ROLLBACK_HEALTH_FLOOR: f64 = 0.6;

/// 7-day mean health required to freeze.
pub const FREEZE_HEALTH_AVG: f64 = 0.95;

/// 7-day pH/EC in-spec percentage required to freeze.
pub const FREEZE_IN_SPEC_PCT: f64 = 95.0;

/// How long a freeze window lasts once entered.
pub const FREEZE_WINDOW_DAYS: i64 = 14;

/// Freeze gate output for this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezeState {
    pub frozen: bool,
    pub freeze_until: Option<DateTime<Utc>>,
    pub reason: String,
}

/// Rollback gate output for this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackState {
    pub required: bool,
    pub reason: String,
    /// Where to roll back to when required.
    pub rollback_to: Option<String>,
}

impl RollbackState {
    fn not_required() -> Self {
        Self {
            required: false,
            reason: String::new(),
            rollback_to: None,
        }
    }
}

/// Sharp health degradation check. Short-circuits the whole evaluation
/// when it fires: a system this unhealthy should revert, not fine-tune.
pub fn check_rollback(kpis: &KpiSnapshot) -> RollbackState {
    if kpis.health_score < ROLLBACK_HEALTH_FLOOR {
        RollbackState {
            required: true,
            reason: format!(
                "health score {:.2} indicates significant degradation",
                kpis.health_score
            ),
            rollback_to: Some("previous_stable_config".to_owned()),
        }
    } else {
        RollbackState::not_required()
    }
}

/// Excellent-performance check. All three thresholds must hold
/// simultaneously; missing trends read as zeros and therefore never
/// freeze.
pub fn check_freeze(trends: Option<&TrendSummary>, now: DateTime<Utc>) -> FreezeState {
    let health_7day = trends.and_then(|t| t.health_7day_avg).unwrap_or(0.0);
    let ph_in_spec = trends.and_then(|t| t.ph_in_spec_7day).unwrap_or(0.0);
    let ec_in_spec = trends.and_then(|t| t.ec_in_spec_7day).unwrap_or(0.0);

    let frozen = health_7day >= FREEZE_HEALTH_AVG
        && ph_in_spec >= FREEZE_IN_SPEC_PCT
        && ec_in_spec >= FREEZE_IN_SPEC_PCT;

    FreezeState {
        frozen,
        freeze_until: frozen.then(|| now + Duration::days(FREEZE_WINDOW_DAYS)),
        reason: format!(
            "Health: {health_7day:.2}, pH in-spec: {ph_in_spec:.1}%, EC in-spec: {ec_in_spec:.1}%"
        ),
    }
}
