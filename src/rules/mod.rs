//! Rule engine — deterministic "stable-unless-better" control logic.
//!
//! One evaluation per control cycle, gates first:
//!
//! ```text
//!  evaluate ──▶ rollback gate ──[fires]──▶ rollback finding only
//!                  │
//!                  ▼
//!              freeze gate ────[fires]──▶ freeze finding only
//!                  │
//!                  ▼
//!      pH ▸ EC ▸ environment ▸ reservoir   (independent rules)
//! ```
//!
//! Every rule that can read its inputs emits a [`RuleFinding`], fired or
//! not — an explicit "stable" narrative is part of the audit trail. A
//! rule whose inputs are missing skips itself; one dead sensor field
//! never blocks unrelated rules. Evaluation is a pure function of its
//! inputs plus immutable config: identical inputs produce identical
//! findings.

pub mod actions;
pub mod gates;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::config::SystemConfig;
use crate::kpi::{KpiSnapshot, TrendSummary};
use crate::reading::SensorReading;
use crate::safety::{DailyDoseLedger, DoseVerdict, Pump};

pub use actions::{Action, Channel, ConfigAdjustment, RuleFinding};
pub use gates::{FreezeState, RollbackState};

// Rule thresholds. Like the gate constants these are tunable values
// carried over from the tuned deployment.

/// 7-day in-spec percentage below which pH/EC adjustment rules arm.
const IN_SPEC_THRESHOLD_PCT: f64 = 90.0;
/// Health score below which the EC-increase rule arms.
const HEALTH_SCORE_THRESHOLD: f64 = 0.8;
/// Weekly dosing above baseline by this fraction flags excessive dosing.
const DOSING_VARIANCE_THRESHOLD: f64 = 0.2;
/// Maximum pH change attempted per adjustment (pH units).
const PH_ADJUSTMENT_LIMIT: f64 = 0.1;
/// Maximum EC change attempted per adjustment (mS/cm).
const EC_ADJUSTMENT_LIMIT: f64 = 0.1;
/// pH deviations below this dead-band are left alone.
const PH_DEADBAND: f64 = 0.2;
/// Temperature tolerance around target (°C).
const TEMP_TOLERANCE_C: f64 = 2.0;
/// Relative humidity above this risks mould regardless of target.
const HUMIDITY_CEILING_PCT: f64 = 80.0;
/// Light level considered "very bright" (lux).
const LUX_STRESS_THRESHOLD: f64 = 30_000.0;
/// EC above this combined with bright light risks tip burn.
const EC_STRESS_THRESHOLD: f64 = 2.0;
/// In-spec percentage above which EC is considered comfortably stable.
const EC_COMFORT_PCT: f64 = 95.0;

/// Result of one full rule evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub timestamp: DateTime<Utc>,
    pub findings: Vec<RuleFinding>,
    pub freeze: FreezeState,
    pub rollback: RollbackState,
}

impl Evaluation {
    /// The proposed actions, in finding order.
    pub fn actions(&self) -> Vec<Action> {
        self.findings
            .iter()
            .filter_map(|f| f.action.clone())
            .collect()
    }
}

/// The stateless rule evaluator. All state it reasons about (trends,
/// the dose ledger, KPIs) arrives as borrowed inputs each cycle.
#[derive(Debug, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate all rules against the current cycle's inputs.
    pub fn evaluate(
        &self,
        config: &SystemConfig,
        reading: &SensorReading,
        kpis: &KpiSnapshot,
        trends: Option<&TrendSummary>,
        ledger: &DailyDoseLedger,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let rollback = gates::check_rollback(kpis);
        let freeze = gates::check_freeze(trends, now);

        // Rollback wins over everything, freeze included: a degraded
        // system must revert before it is allowed to coast.
        if rollback.required {
            let finding = RuleFinding::observation("rollback_check", rollback.reason.clone());
            return Evaluation {
                timestamp: now,
                findings: vec![finding],
                freeze,
                rollback,
            };
        }

        if freeze.frozen {
            let finding = RuleFinding::observation(
                "freeze_check",
                "System frozen - excellent performance maintained",
            );
            return Evaluation {
                timestamp: now,
                findings: vec![finding],
                freeze,
                rollback,
            };
        }

        let mut findings = Vec::new();
        if let Some(f) = self.evaluate_ph(config, reading, trends, ledger) {
            findings.push(f);
        }
        findings.extend(self.evaluate_ec(config, reading, kpis, trends, ledger));
        findings.extend(self.evaluate_environment(config, reading));
        findings.push(self.evaluate_reservoir(config, kpis));

        Evaluation {
            timestamp: now,
            findings,
            freeze,
            rollback,
        }
    }

    // ── pH rule ───────────────────────────────────────────────

    fn evaluate_ph(
        &self,
        config: &SystemConfig,
        reading: &SensorReading,
        trends: Option<&TrendSummary>,
        ledger: &DailyDoseLedger,
    ) -> Option<RuleFinding> {
        let current_ph = reading.water.ph?;
        let target = config.targets.ph.target;
        // No trend data reads as "no evidence of drift" — the rule
        // stays quiet rather than dosing on a single reading.
        let in_spec_7day = trends
            .and_then(|t| t.ph_in_spec_7day)
            .unwrap_or(100.0);

        if in_spec_7day < IN_SPEC_THRESHOLD_PCT {
            let deviation = current_ph - target;

            if deviation.abs() > PH_DEADBAND {
                let adjustment = (deviation.abs() * 0.5).min(PH_ADJUSTMENT_LIMIT);

                let (ml, reason) = if deviation > 0.0 {
                    (
                        ph_down_dosage_ml(adjustment, config.reservoir_volume_l),
                        format!(
                            "pH {current_ph} > target {target}, 7-day in-spec: {in_spec_7day}%"
                        ),
                    )
                } else {
                    (
                        ph_up_dosage_ml(adjustment, config.reservoir_volume_l),
                        format!(
                            "pH {current_ph} < target {target}, 7-day in-spec: {in_spec_7day}%"
                        ),
                    )
                };
                let ml = round_ml(ml);

                return Some(match config.safety.check_dose(Pump::Ph, ml, ledger) {
                    DoseVerdict::Safe => RuleFinding::with_action(
                        "ph_adjustment",
                        format!("pH adjustment needed: {reason}"),
                        Action::Dose {
                            pump: Pump::Ph,
                            ml,
                            reason,
                        },
                    ),
                    DoseVerdict::Rejected(violation) => {
                        warn!("pH adjustment withheld: {violation}");
                        RuleFinding::observation(
                            "ph_adjustment",
                            format!("pH adjustment withheld by safety limiter: {violation}"),
                        )
                    }
                });
            }
        }

        Some(RuleFinding::observation(
            "ph_check",
            format!("pH stable: current {current_ph}, 7-day in-spec: {in_spec_7day}%"),
        ))
    }

    // ── EC rules ──────────────────────────────────────────────

    fn evaluate_ec(
        &self,
        config: &SystemConfig,
        reading: &SensorReading,
        kpis: &KpiSnapshot,
        trends: Option<&TrendSummary>,
        ledger: &DailyDoseLedger,
    ) -> Vec<RuleFinding> {
        let Some(current_ec) = reading.water.ec else {
            return Vec::new();
        };
        let target = config.targets.ec.target;
        let in_spec_7day = trends
            .and_then(|t| t.ec_in_spec_7day)
            .unwrap_or(100.0);
        let ml_total_7day = trends.map_or(0.0, |t| t.ml_total_7day);

        // Rule 1: raise EC when compliance and health are both poor and
        // the solution is genuinely lean.
        if in_spec_7day < IN_SPEC_THRESHOLD_PCT
            && kpis.health_score < HEALTH_SCORE_THRESHOLD
            && current_ec < target
        {
            let adjustment = (target - current_ec).min(EC_ADJUSTMENT_LIMIT);
            let dosage_ml = nutrient_dosage_ml(adjustment, config.reservoir_volume_l);
            let narrative = format!(
                "EC increase needed: health {:.2}, in-spec {in_spec_7day}%",
                kpis.health_score
            );
            let reason = format!("Raise EC from {current_ec} toward {target}");

            // Two-part nutrient: 60/40 split across pumps A and B, each
            // part safety-gated on its own.
            let mut findings = Vec::new();
            for (pump, fraction) in [(Pump::NutrientA, 0.6), (Pump::NutrientB, 0.4)] {
                let ml = round_ml(dosage_ml * fraction);
                match config.safety.check_dose(pump, ml, ledger) {
                    DoseVerdict::Safe => findings.push(RuleFinding::with_action(
                        "ec_increase",
                        narrative.clone(),
                        Action::Dose {
                            pump,
                            ml,
                            reason: reason.clone(),
                        },
                    )),
                    DoseVerdict::Rejected(violation) => {
                        warn!("EC increase withheld on {pump}: {violation}");
                        findings.push(RuleFinding::observation(
                            "ec_increase",
                            format!("EC increase withheld by safety limiter: {violation}"),
                        ));
                    }
                }
            }
            return findings;
        }

        // Rule 2: when dosing volume keeps climbing past baseline while
        // EC sits above target, the setpoint itself is wrong. Correct by
        // recommendation, not by dilution dosing.
        let baseline = config.baseline_dosing_ml_per_week;
        if ml_total_7day > baseline * (1.0 + DOSING_VARIANCE_THRESHOLD)
            && current_ec > target
            && in_spec_7day > EC_COMFORT_PCT
        {
            let adjustment = (current_ec - target).min(EC_ADJUSTMENT_LIMIT);
            let new_target = round_ec(target - adjustment);
            return vec![RuleFinding::with_action(
                "ec_decrease",
                format!("Excessive dosing detected: {ml_total_7day}ml > {baseline}ml baseline"),
                Action::ConfigChange {
                    change: ConfigAdjustment::EcTarget(new_target),
                    reason: "Reduce EC target due to excessive dosing".to_owned(),
                },
            )];
        }

        vec![RuleFinding::observation(
            "ec_check",
            format!(
                "EC stable: current {current_ec}, target {target}, 7-day in-spec: {in_spec_7day}%"
            ),
        )]
    }

    // ── Environmental rules ───────────────────────────────────

    fn evaluate_environment(
        &self,
        config: &SystemConfig,
        reading: &SensorReading,
    ) -> Vec<RuleFinding> {
        let mut findings = Vec::new();
        let mut any_input = false;

        // Temperature: fan speed proportional to overshoot, capped.
        if let Some(temp) = reading.air.temperature {
            any_input = true;
            let target = config.targets.temp.target;

            if temp > target + TEMP_TOLERANCE_C {
                let speed = (((temp - target) * 20.0) as i64).min(80).max(0) as u8;
                findings.push(RuleFinding::with_action(
                    "temperature_cooling",
                    format!("Temperature {temp}°C > {}°C", target + TEMP_TOLERANCE_C),
                    Action::Fan {
                        speed_pct: speed,
                        duration_mins: Some(30),
                        reason: format!("Cooling: temperature {temp}°C too high"),
                    },
                ));
            } else if temp < target - TEMP_TOLERANCE_C {
                findings.push(RuleFinding::with_action(
                    "temperature_heating",
                    format!("Temperature {temp}°C < {}°C", target - TEMP_TOLERANCE_C),
                    Action::Fan {
                        speed_pct: 10,
                        duration_mins: None,
                        reason: format!("Reduce cooling: temperature {temp}°C too low"),
                    },
                ));
            }
        }

        // Humidity: hard ceiling regardless of configured target.
        if let Some(humidity) = reading.air.humidity {
            any_input = true;
            if humidity > HUMIDITY_CEILING_PCT {
                findings.push(RuleFinding::with_action(
                    "humidity_control",
                    format!("High humidity {humidity}% > {HUMIDITY_CEILING_PCT}%"),
                    Action::Fan {
                        speed_pct: 60,
                        duration_mins: Some(20),
                        reason: format!("Humidity control: {humidity}% too high"),
                    },
                ));
            }
        }

        // Light: very bright light on a hot nutrient mix stresses tips.
        if let Some(lux) = reading.light.lux {
            any_input = true;
            let ec = reading.water.ec.unwrap_or(0.0);
            if lux > LUX_STRESS_THRESHOLD && ec > EC_STRESS_THRESHOLD {
                findings.push(RuleFinding::with_action(
                    "light_stress_prevention",
                    format!("High light {lux} lux + high EC {ec} = stress risk"),
                    Action::Led {
                        power_pct: 70,
                        reason: "Prevent light stress with high EC".to_owned(),
                    },
                ));
            }
        }

        if findings.is_empty() && any_input {
            findings.push(RuleFinding::observation(
                "environment_check",
                "Environment stable: no corrective action needed",
            ));
        }

        findings
    }

    // ── Reservoir change rule ─────────────────────────────────

    fn evaluate_reservoir(&self, config: &SystemConfig, kpis: &KpiSnapshot) -> RuleFinding {
        let days = kpis.days_since_reservoir_change;
        let phase = config.grow_phase;
        let max_days = phase.reservoir_change_days();

        if days >= max_days {
            RuleFinding::with_action(
                "reservoir_change_cadence",
                format!(
                    "Reservoir change due: {days} days >= {max_days} days for {}",
                    phase.name()
                ),
                Action::ReservoirChange {
                    reason: format!(
                        "Scheduled change for {} phase after {days} days",
                        phase.name()
                    ),
                },
            )
        } else {
            RuleFinding::observation(
                "reservoir_check",
                format!("Reservoir OK: {days}/{max_days} days for {}", phase.name()),
            )
        }
    }
}

// ── Dosage formulas ───────────────────────────────────────────
// Empirical: 1 ml of pH-down shifts 10 L of solution by 0.1 pH; pH-up
// is more concentrated (×0.7); 5 ml of A+B raises 10 L by 0.1 EC.

fn ph_down_dosage_ml(ph_adjustment: f64, reservoir_volume_l: f64) -> f64 {
    (ph_adjustment / 0.1) * (reservoir_volume_l / 10.0)
}

fn ph_up_dosage_ml(ph_adjustment: f64, reservoir_volume_l: f64) -> f64 {
    ph_down_dosage_ml(ph_adjustment, reservoir_volume_l) * 0.7
}

fn nutrient_dosage_ml(ec_adjustment: f64, reservoir_volume_l: f64) -> f64 {
    (ec_adjustment / 0.1) * 5.0 * (reservoir_volume_l / 10.0)
}

fn round_ml(ml: f64) -> f64 {
    (ml * 10.0).round() / 10.0
}

fn round_ec(ec: f64) -> f64 {
    (ec * 100.0).round() / 100.0
}
