//! Safety limiter and daily dose ledger.
//!
//! Every proposed dose passes through [`SafetyLimits::check_dose`]
//! **before** a pump command is dispatched. The check never errors and
//! never panics — it returns a structured [`DoseVerdict`] the executor
//! consumes, so a rejected dose is dropped and logged rather than
//! aborting the cycle.
//!
//! ## Ledger discipline
//!
//! The [`DailyDoseLedger`] tracks cumulative millilitres per pump since
//! local midnight. It has a single writer: the execution step records a
//! dose only after the pump confirmed it ran. The rule engine and the
//! limiter read the ledger, never mutate it, so a dose that is proposed
//! but later rejected or failed leaves the ledger untouched.

use std::fmt;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::SafetyViolation;

// ---------------------------------------------------------------------------
// Pumps
// ---------------------------------------------------------------------------

/// The dosing pumps attached to the reservoir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pump {
    /// Nutrient part A.
    NutrientA,
    /// Nutrient part B.
    NutrientB,
    /// pH adjustment (down or up solution, depending on plumbing).
    Ph,
    /// Fresh-water refill.
    Refill,
}

impl Pump {
    /// All pumps, in ledger order.
    pub const ALL: [Pump; 4] = [Pump::NutrientA, Pump::NutrientB, Pump::Ph, Pump::Refill];

    /// Wire/storage name of the pump.
    pub fn name(self) -> &'static str {
        match self {
            Self::NutrientA => "pump_a",
            Self::NutrientB => "pump_b",
            Self::Ph => "ph_pump",
            Self::Refill => "refill_pump",
        }
    }

    /// Calibrated flow rate, used to derive run duration from volume.
    /// A dose always runs to completion — duration is computed up front,
    /// never cancelled mid-dispense.
    pub fn flow_rate_ml_per_s(self) -> f64 {
        match self {
            Self::NutrientA | Self::NutrientB => 2.5,
            Self::Ph => 1.0,
            Self::Refill => 50.0,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::NutrientA => 0,
            Self::NutrientB => 1,
            Self::Ph => 2,
            Self::Refill => 3,
        }
    }
}

impl fmt::Display for Pump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Safety limits
// ---------------------------------------------------------------------------

/// Absolute bounds and dosing ceilings. Loaded once at startup and
/// treated as immutable configuration for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyLimits {
    // Absolute water chemistry envelope — targets outside these bounds
    // are a configuration error, not something to dose toward.
    pub ph_min_absolute: f64,
    pub ph_max_absolute: f64,
    pub ec_min_absolute: f64,
    pub ec_max_absolute: f64,
    pub temp_min_absolute: f64,
    pub temp_max_absolute: f64,

    // Per-pump single-dose ceilings (ml per operation).
    pub pump_a_max_ml: f64,
    pub pump_b_max_ml: f64,
    pub ph_pump_max_ml: f64,
    pub refill_max_ml: f64,

    /// Daily cumulative ceiling per pump (ml). The refill pump is
    /// exempt — topping up water is not dosing.
    pub daily_dose_limit_ml: f64,

    pub fan_max_speed: u8,
    pub led_max_power: u8,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            ph_min_absolute: 4.0,
            ph_max_absolute: 8.0,
            ec_min_absolute: 0.5,
            ec_max_absolute: 3.0,
            temp_min_absolute: 10.0,
            temp_max_absolute: 35.0,

            pump_a_max_ml: 50.0,
            pump_b_max_ml: 50.0,
            ph_pump_max_ml: 20.0,
            refill_max_ml: 1000.0,

            daily_dose_limit_ml: 200.0,

            fan_max_speed: 100,
            led_max_power: 100,
        }
    }
}

impl SafetyLimits {
    /// Single-dose ceiling for the given pump.
    pub fn single_dose_limit_ml(&self, pump: Pump) -> f64 {
        match pump {
            Pump::NutrientA => self.pump_a_max_ml,
            Pump::NutrientB => self.pump_b_max_ml,
            Pump::Ph => self.ph_pump_max_ml,
            Pump::Refill => self.refill_max_ml,
        }
    }

    /// Validate a proposed dose against the single-dose ceiling and the
    /// daily cumulative ceiling.
    ///
    /// Checks run in a fixed order and the first violation wins:
    /// non-positive volume, then single-dose ceiling, then daily
    /// cumulative ceiling. The refill pump skips the daily check.
    pub fn check_dose(&self, pump: Pump, ml: f64, ledger: &DailyDoseLedger) -> DoseVerdict {
        if ml <= 0.0 {
            return DoseVerdict::Rejected(SafetyViolation::NonPositiveVolume { pump, ml });
        }

        let single_limit = self.single_dose_limit_ml(pump);
        if ml > single_limit {
            return DoseVerdict::Rejected(SafetyViolation::SingleDoseExceeded {
                pump,
                ml,
                limit_ml: single_limit,
            });
        }

        if pump != Pump::Refill {
            let would_total = ledger.total_ml(pump) + ml;
            if would_total > self.daily_dose_limit_ml {
                return DoseVerdict::Rejected(SafetyViolation::DailyLimitExceeded {
                    pump,
                    would_total_ml: would_total,
                    limit_ml: self.daily_dose_limit_ml,
                });
            }
        }

        DoseVerdict::Safe
    }
}

/// Outcome of a safety check. Never an `Err` — rejection is a normal,
/// expected result the executor must handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseVerdict {
    Safe,
    Rejected(SafetyViolation),
}

impl DoseVerdict {
    pub fn is_safe(self) -> bool {
        matches!(self, Self::Safe)
    }
}

// ---------------------------------------------------------------------------
// Daily dose ledger
// ---------------------------------------------------------------------------

/// Cumulative millilitres dosed per pump since local midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyDoseLedger {
    totals_ml: [f64; 4],
    day: NaiveDate,
}

impl DailyDoseLedger {
    /// Fresh ledger for the given local date.
    pub fn new(day: NaiveDate) -> Self {
        Self {
            totals_ml: [0.0; 4],
            day,
        }
    }

    /// Cumulative total for a pump today.
    pub fn total_ml(&self, pump: Pump) -> f64 {
        self.totals_ml[pump.index()]
    }

    /// Grand total across the dosing pumps (refill excluded).
    pub fn dosing_total_ml(&self) -> f64 {
        self.total_ml(Pump::NutrientA) + self.total_ml(Pump::NutrientB) + self.total_ml(Pump::Ph)
    }

    /// The local date this ledger is counting.
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Record a confirmed successful dose. Call **only** after the pump
    /// acknowledged execution — never speculatively.
    pub fn record(&mut self, pump: Pump, ml: f64) {
        self.totals_ml[pump.index()] += ml;
    }

    /// Reset all counters if the local date has rolled over. Returns
    /// `true` when a reset happened.
    pub fn reset_if_new_day(&mut self, today: NaiveDate) -> bool {
        if today > self.day {
            self.totals_ml = [0.0; 4];
            self.day = today;
            info!("daily dose counters reset for {today}");
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn empty_ledger() -> DailyDoseLedger {
        DailyDoseLedger::new(day(1))
    }

    #[test]
    fn zero_and_negative_doses_are_rejected() {
        let limits = SafetyLimits::default();
        let ledger = empty_ledger();
        assert!(!limits.check_dose(Pump::NutrientA, 0.0, &ledger).is_safe());
        assert!(!limits.check_dose(Pump::NutrientA, -5.0, &ledger).is_safe());
    }

    #[test]
    fn single_dose_ceiling_per_pump() {
        let limits = SafetyLimits::default();
        let ledger = empty_ledger();

        assert!(limits.check_dose(Pump::NutrientA, 50.0, &ledger).is_safe());
        assert!(!limits.check_dose(Pump::NutrientA, 50.1, &ledger).is_safe());

        // The pH pump has a tighter ceiling than the nutrient pumps.
        assert!(limits.check_dose(Pump::Ph, 20.0, &ledger).is_safe());
        assert!(!limits.check_dose(Pump::Ph, 25.0, &ledger).is_safe());

        assert!(limits.check_dose(Pump::Refill, 1000.0, &ledger).is_safe());
    }

    #[test]
    fn daily_limit_rejected_even_when_single_dose_ok() {
        let limits = SafetyLimits::default();
        let mut ledger = empty_ledger();
        ledger.record(Pump::NutrientA, 190.0);

        let verdict = limits.check_dose(Pump::NutrientA, 15.0, &ledger);
        match verdict {
            DoseVerdict::Rejected(SafetyViolation::DailyLimitExceeded {
                would_total_ml, ..
            }) => {
                assert!((would_total_ml - 205.0).abs() < 1e-9);
            }
            other => panic!("expected daily-limit rejection, got {other:?}"),
        }
    }

    #[test]
    fn single_dose_check_runs_before_daily_check() {
        let limits = SafetyLimits::default();
        let mut ledger = empty_ledger();
        ledger.record(Pump::NutrientA, 199.0);

        // 60ml violates both limits; the single-dose reason must win.
        match limits.check_dose(Pump::NutrientA, 60.0, &ledger) {
            DoseVerdict::Rejected(SafetyViolation::SingleDoseExceeded { .. }) => {}
            other => panic!("expected single-dose rejection, got {other:?}"),
        }
    }

    #[test]
    fn refill_is_exempt_from_daily_limit() {
        let limits = SafetyLimits::default();
        let mut ledger = empty_ledger();
        ledger.record(Pump::Refill, 900.0);
        assert!(limits.check_dose(Pump::Refill, 500.0, &ledger).is_safe());
    }

    #[test]
    fn ledger_resets_on_new_day_only() {
        let mut ledger = empty_ledger();
        ledger.record(Pump::Ph, 12.0);

        assert!(!ledger.reset_if_new_day(day(1)));
        assert!((ledger.total_ml(Pump::Ph) - 12.0).abs() < 1e-9);

        assert!(ledger.reset_if_new_day(day(2)));
        assert_eq!(ledger.total_ml(Pump::Ph), 0.0);
        assert_eq!(ledger.day(), day(2));
    }

    #[test]
    fn dosing_total_excludes_refill() {
        let mut ledger = empty_ledger();
        ledger.record(Pump::NutrientA, 10.0);
        ledger.record(Pump::NutrientB, 5.0);
        ledger.record(Pump::Refill, 500.0);
        assert!((ledger.dosing_total_ml() - 15.0).abs() < 1e-9);
    }
}
