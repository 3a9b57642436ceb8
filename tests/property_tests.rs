//! Property tests for the decision core's invariants.
//!
//! The safety limiter, KPI scoring, stability filter and combiner are
//! all small pure functions — exactly the shape proptest is good at.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;

use verdant::combine::{AdvisoryPlan, DecisionCombiner};
use verdant::config::Targets;
use verdant::filter::StabilityFilter;
use verdant::kpi::stats::classify_trend;
use verdant::kpi::{DosingTotals, KpiEngine};
use verdant::reading::SensorReading;
use verdant::rules::{Action, RollbackState};
use verdant::safety::{DailyDoseLedger, DoseVerdict, Pump, SafetyLimits};

fn ledger_with(pump: Pump, ml: f64) -> DailyDoseLedger {
    let mut ledger = DailyDoseLedger::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    ledger.record(pump, ml);
    ledger
}

fn arb_pump() -> impl Strategy<Value = Pump> {
    prop_oneof![
        Just(Pump::NutrientA),
        Just(Pump::NutrientB),
        Just(Pump::Ph),
        Just(Pump::Refill),
    ]
}

// ── Safety limiter ────────────────────────────────────────────

proptest! {
    /// Non-positive volumes are always rejected, for every pump and
    /// every ledger state.
    #[test]
    fn non_positive_doses_never_pass(
        pump in arb_pump(),
        ml in -1000.0f64..=0.0,
        dosed in 0.0f64..300.0,
    ) {
        let limits = SafetyLimits::default();
        let ledger = ledger_with(pump, dosed);
        prop_assert!(!limits.check_dose(pump, ml, &ledger).is_safe());
    }

    /// When a dose is accepted, every limit actually holds.
    #[test]
    fn accepted_doses_satisfy_every_limit(
        pump in arb_pump(),
        ml in -100.0f64..1500.0,
        dosed in 0.0f64..300.0,
    ) {
        let limits = SafetyLimits::default();
        let ledger = ledger_with(pump, dosed);

        if let DoseVerdict::Safe = limits.check_dose(pump, ml, &ledger) {
            prop_assert!(ml > 0.0);
            prop_assert!(ml <= limits.single_dose_limit_ml(pump));
            if pump != Pump::Refill {
                prop_assert!(ledger.total_ml(pump) + ml <= limits.daily_dose_limit_ml);
            }
        }
    }
}

// ── KPI scoring ───────────────────────────────────────────────

fn arb_reading() -> impl Strategy<Value = SensorReading> {
    (
        proptest::option::of(-5.0f64..20.0),
        proptest::option::of(-2.0f64..10.0),
        proptest::option::of(-40.0f64..80.0),
        proptest::option::of(0.0f64..200.0),
        proptest::option::of(0.0f64..10_000.0),
    )
        .prop_map(|(ph, ec, temp, humidity, co2)| {
            let mut r = SensorReading::empty(Utc::now());
            r.water.ph = ph;
            r.water.ec = ec;
            r.air.temperature = temp;
            r.air.humidity = humidity;
            r.air.co2 = co2;
            r
        })
}

proptest! {
    /// Health score is bounded to [0, 1] for any reading, however
    /// broken the sensors are.
    #[test]
    fn health_score_always_in_unit_interval(reading in arb_reading()) {
        let kpis = KpiEngine::new().current_kpis(
            &reading,
            &Targets::default(),
            DosingTotals::default(),
            0,
        );
        prop_assert!((0.0..=1.0).contains(&kpis.health_score));
        for score in [
            kpis.ph_in_spec,
            kpis.ec_in_spec,
            kpis.temp_in_spec,
            kpis.humidity_in_spec,
            kpis.co2_in_spec,
        ] {
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }

    /// Trend classification is total — any series classifies without
    /// panicking.
    #[test]
    fn trend_classification_is_total(
        values in proptest::collection::vec(-1_000.0f64..1_000.0, 0..50),
    ) {
        let _ = classify_trend(&values);
    }
}

// ── Stability filter ──────────────────────────────────────────

fn arb_actions() -> impl Strategy<Value = Vec<Action>> {
    proptest::collection::vec(
        prop_oneof![
            (arb_pump(), 0.1f64..100.0).prop_map(|(pump, ml)| Action::Dose {
                pump,
                ml,
                reason: "prop".into(),
            }),
            (0u8..=100).prop_map(|speed_pct| Action::Fan {
                speed_pct,
                duration_mins: None,
                reason: "prop".into(),
            }),
            (0u8..=100).prop_map(|power_pct| Action::Led {
                power_pct,
                reason: "prop".into(),
            }),
        ],
        0..8,
    )
}

proptest! {
    /// The filter only ever shrinks dose volumes, never grows them,
    /// and never touches non-dose actions.
    #[test]
    fn filter_never_amplifies(actions in arb_actions(), health in 0.0f64..=1.0) {
        let mut kpis = KpiEngine::new().current_kpis(
            &SensorReading::empty(Utc::now()),
            &Targets::default(),
            DosingTotals::default(),
            0,
        );
        kpis.health_score = health;

        let outcome = StabilityFilter::new().apply(actions.clone(), &kpis);

        prop_assert!([0.5, 0.8, 1.0].contains(&outcome.stability_factor));
        prop_assert_eq!(outcome.actions.len(), actions.len());

        for (before, after) in actions.iter().zip(outcome.actions.iter()) {
            match (before, after) {
                (Action::Dose { ml: before_ml, .. }, Action::Dose { ml: after_ml, .. }) => {
                    // Rounding to 0.1 ml can add at most 0.05.
                    prop_assert!(*after_ml <= before_ml + 0.05);
                }
                _ => prop_assert_eq!(before, after),
            }
        }
    }
}

// ── Combiner ──────────────────────────────────────────────────

proptest! {
    /// When the rules dosed, the combined output contains exactly the
    /// rule doses — advisory dosing never adds to an occupied channel.
    #[test]
    fn advisory_never_adds_doses_to_an_occupied_channel(
        rule_actions in arb_actions(),
        advisory_actions in arb_actions(),
    ) {
        let no_rollback = RollbackState {
            required: false,
            reason: String::new(),
            rollback_to: None,
        };
        let plan = AdvisoryPlan {
            actions: advisory_actions,
            confidence: 0.5,
            reasoning: "prop".into(),
        };

        let rule_dose_count = rule_actions.iter().filter(|a| a.is_dose()).count();
        let combined = DecisionCombiner::new().combine(rule_actions, &no_rollback, Some(&plan));
        let combined_dose_count = combined.iter().filter(|a| a.is_dose()).count();

        if rule_dose_count > 0 {
            prop_assert_eq!(combined_dose_count, rule_dose_count);
        }
    }

    /// A required rollback always collapses to exactly one emergency
    /// stop, whatever else was proposed.
    #[test]
    fn rollback_always_collapses(
        rule_actions in arb_actions(),
        advisory_actions in arb_actions(),
    ) {
        let rollback = RollbackState {
            required: true,
            reason: "prop degradation".into(),
            rollback_to: Some("previous_stable_config".into()),
        };
        let plan = AdvisoryPlan {
            actions: advisory_actions,
            confidence: 0.5,
            reasoning: "prop".into(),
        };

        let combined = DecisionCombiner::new().combine(rule_actions, &rollback, Some(&plan));
        prop_assert_eq!(combined.len(), 1);
        let is_emergency_stop = matches!(combined[0], Action::EmergencyStop { .. });
        prop_assert!(is_emergency_stop);
    }
}
