//! Stable-unless-better filter.
//!
//! Post-processes the rule engine's candidate actions by throttling
//! dose volumes according to current health. The better the system is
//! already doing, the smaller the intervention it is allowed — strength
//! is inversely proportional to demonstrated stability, not to the raw
//! magnitude of the detected deviation. This damps the oscillation you
//! get from correcting a system that was about to settle on its own.
//!
//! Only dosing volume is throttled. Fan, LED, recommendations and
//! emergency actions pass through untouched regardless of the factor.

use log::info;

use crate::kpi::KpiSnapshot;
use crate::rules::Action;

/// Health above this is "excellent" — halve every dose.
const EXCELLENT_HEALTH: f64 = 0.9;
/// Health above this is "good" — trim doses slightly.
const GOOD_HEALTH: f64 = 0.8;

const EXCELLENT_FACTOR: f64 = 0.5;
const GOOD_FACTOR: f64 = 0.8;
const FULL_FACTOR: f64 = 1.0;

/// Filter result: the (possibly scaled) actions plus the factor and a
/// narrative for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub actions: Vec<Action>,
    pub stability_factor: f64,
    pub reason: String,
}

/// The stable-unless-better dose throttle.
#[derive(Debug, Default)]
pub struct StabilityFilter;

impl StabilityFilter {
    pub fn new() -> Self {
        Self
    }

    /// Scale dose volumes by the stability factor for the current
    /// health score.
    pub fn apply(&self, actions: Vec<Action>, kpis: &KpiSnapshot) -> FilterOutcome {
        let health = kpis.health_score;

        let (factor, reason) = if health > EXCELLENT_HEALTH {
            (
                EXCELLENT_FACTOR,
                format!("High performance ({health:.2}) - reduced intervention"),
            )
        } else if health > GOOD_HEALTH {
            (
                GOOD_FACTOR,
                format!("Good performance ({health:.2}) - slight reduction"),
            )
        } else {
            (
                FULL_FACTOR,
                format!("Poor performance ({health:.2}) - full intervention needed"),
            )
        };

        let actions = if factor < FULL_FACTOR {
            actions
                .into_iter()
                .map(|action| scale_dose(action, factor))
                .collect()
        } else {
            actions
        };

        if factor < FULL_FACTOR {
            info!("stability filter active: factor {factor}");
        }

        FilterOutcome {
            actions,
            stability_factor: factor,
            reason,
        }
    }
}

fn scale_dose(action: Action, factor: f64) -> Action {
    match action {
        Action::Dose { pump, ml, reason } => Action::Dose {
            pump,
            ml: round_ml(ml * factor),
            reason: format!("Reduced dose (stable system): {reason}"),
        },
        other => other,
    }
}

fn round_ml(ml: f64) -> f64 {
    (ml * 10.0).round() / 10.0
}
