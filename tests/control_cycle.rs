//! Integration tests for the full control cycle:
//! sensors → KPIs → rules → stability filter → combiner → actuators.
//!
//! These drive [`ControlService`] through the mock rig and in-memory
//! history adapters, asserting on the actuator call history and the
//! cycle summary — no hardware, no database.

use chrono::{Duration, Local, Utc};

use verdant::adapters::log_sink::RecordingSink;
use verdant::adapters::memory_history::MemoryHistory;
use verdant::adapters::mock_rig::{ActuatorCall, MockRig};
use verdant::app::events::CycleEvent;
use verdant::app::ports::{ActionRecord, Advisor};
use verdant::app::service::ControlService;
use verdant::combine::AdvisoryPlan;
use verdant::config::SystemConfig;
use verdant::error::{AdvisoryError, Error, SensorError};
use verdant::kpi::{DosingTotals, KpiSnapshot, ParamStats, PeriodKpi, PeriodLabel};
use verdant::reading::SensorReading;
use verdant::rules::Action;
use verdant::safety::Pump;

// ── Fixtures ──────────────────────────────────────────────────

fn reading(ph: f64, ec: f64, temp: f64, humidity: f64, co2: f64) -> SensorReading {
    let mut r = SensorReading::empty(Utc::now());
    r.water.ph = Some(ph);
    r.water.ec = Some(ec);
    r.water.level_high = Some(true);
    r.water.level_low = Some(true);
    r.air.temperature = Some(temp);
    r.air.humidity = Some(humidity);
    r.air.co2 = Some(co2);
    r
}

/// A stored rollup with the given pH/EC in-spec percentages, 7-day
/// health and dosing total. Two of these make trends computable.
fn rollup(ph_pct: f64, ec_pct: f64, health: f64, ml_total: f64) -> PeriodKpi {
    let stats = |avg: f64, pct: f64| ParamStats {
        avg,
        min: avg - 0.1,
        max: avg + 0.1,
        stdev: 0.05,
        in_spec_pct: pct,
    };
    PeriodKpi {
        timestamp: Utc::now(),
        period: PeriodLabel::Day,
        reading_count: 144,
        ph: Some(stats(6.2, ph_pct)),
        ec: Some(stats(1.6, ec_pct)),
        temp: None,
        humidity: None,
        co2: None,
        health_score: Some(health),
        dosing: DosingTotals {
            pump_a_ml: ml_total / 2.0,
            pump_b_ml: ml_total / 2.0,
            ph_pump_ml: 0.0,
            total_ml: ml_total,
        },
    }
}

fn history_with_trends(ph_pct: f64, ec_pct: f64, health: f64, ml_total: f64) -> MemoryHistory {
    let mut history = MemoryHistory::new();
    history.push_rollup(rollup(ph_pct, ec_pct, health, ml_total / 2.0));
    history.push_rollup(rollup(ph_pct, ec_pct, health, ml_total / 2.0));
    history.set_reservoir_changed_at(Utc::now() - Duration::days(3));
    history
}

fn service(config: SystemConfig) -> ControlService {
    ControlService::new(config, Local::now().date_naive())
}

fn executed_doses(calls: &[ActuatorCall]) -> Vec<(Pump, f64)> {
    calls
        .iter()
        .filter_map(|c| match c {
            ActuatorCall::Dose { pump, ml } => Some((*pump, *ml)),
            _ => None,
        })
        .collect()
}

// ── Advisor stubs ─────────────────────────────────────────────

struct StubAdvisor {
    plan: AdvisoryPlan,
    called: bool,
}

impl StubAdvisor {
    fn suggesting(actions: Vec<Action>) -> Self {
        Self {
            plan: AdvisoryPlan {
                actions,
                confidence: 0.8,
                reasoning: "stub".into(),
            },
            called: false,
        }
    }
}

impl Advisor for StubAdvisor {
    fn suggest(
        &mut self,
        _reading: &SensorReading,
        _kpis: &KpiSnapshot,
        _recent: &[ActionRecord],
    ) -> Result<AdvisoryPlan, AdvisoryError> {
        self.called = true;
        Ok(self.plan.clone())
    }
}

struct DownAdvisor;

impl Advisor for DownAdvisor {
    fn suggest(
        &mut self,
        _reading: &SensorReading,
        _kpis: &KpiSnapshot,
        _recent: &[ActionRecord],
    ) -> Result<AdvisoryPlan, AdvisoryError> {
        Err(AdvisoryError::Unavailable("connection refused".into()))
    }
}

// ── pH drift end-to-end ───────────────────────────────────────

#[test]
fn drifted_ph_produces_one_halved_safety_capped_dose() {
    // pH 6.8 against target 6.0 with a poor 7-day pH record: the pH
    // rule computes a 2.0 ml pH-down dose for the 20 L reservoir, and
    // the stability filter halves it because current health is high.
    let mut svc = service(SystemConfig::default());
    let mut rig = MockRig::with_reading(reading(6.8, 1.6, 22.0, 60.0, 800.0));
    let mut history = history_with_trends(85.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();

    let summary = svc
        .run_cycle(&mut rig, &mut history, None, &mut sink, Utc::now())
        .unwrap();

    assert!(summary.success);
    assert!(!summary.frozen && !summary.rollback);
    assert!(summary.health_score > 0.9);
    assert_eq!(summary.stability_factor, 0.5);

    // Exactly one dose, on the pH pump, at half the computed 2.0 ml.
    assert_eq!(executed_doses(&rig.calls), vec![(Pump::Ph, 1.0)]);
    assert!((svc.ledger().total_ml(Pump::Ph) - 1.0).abs() < 1e-9);

    // The action history was stored for future KPI rollups.
    assert_eq!(history.actions().len(), 1);
    assert!(history.actions()[0].success);
    assert!((history.actions()[0].ph_pump_ml - 1.0).abs() < 1e-9);
}

// ── Rollback end-to-end ───────────────────────────────────────

#[test]
fn degraded_health_collapses_to_emergency_stop() {
    let mut svc = service(SystemConfig::default());
    // Everything far out of range → health well below the 0.6 floor.
    let mut rig = MockRig::with_reading(reading(3.0, 4.0, 40.0, 99.0, 100.0));
    let mut history = history_with_trends(85.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();

    let summary = svc
        .run_cycle(&mut rig, &mut history, None, &mut sink, Utc::now())
        .unwrap();

    assert!(summary.rollback);
    assert_eq!(summary.findings.len(), 1);
    assert_eq!(summary.findings[0].rule, "rollback_check");
    assert_eq!(summary.executed.len(), 1);
    assert!(matches!(summary.executed[0], Action::EmergencyStop { .. }));
    assert!(rig.stopped());
    assert!(executed_doses(&rig.calls).is_empty());
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, CycleEvent::RollbackTriggered { .. })));
}

// ── Freeze end-to-end ─────────────────────────────────────────

#[test]
fn frozen_system_takes_no_action_and_skips_the_advisor() {
    let mut svc = service(SystemConfig::default());
    // pH has drifted, but the 7-day record is excellent on all three
    // freeze thresholds — the system coasts.
    let mut rig = MockRig::with_reading(reading(6.8, 1.6, 22.0, 60.0, 800.0));
    let mut history = history_with_trends(97.0, 96.0, 0.96, 40.0);
    let mut sink = RecordingSink::new();
    let mut advisor = StubAdvisor::suggesting(vec![Action::Dose {
        pump: Pump::NutrientA,
        ml: 10.0,
        reason: "advisor".into(),
    }]);

    let summary = svc
        .run_cycle(&mut rig, &mut history, Some(&mut advisor), &mut sink, Utc::now())
        .unwrap();

    assert!(summary.frozen);
    assert!(summary.executed.is_empty());
    assert!(rig.calls.is_empty(), "no actuator may move while frozen");
    assert!(!advisor.called, "a frozen cycle must not consult the advisor");
}

// ── Advisory precedence ───────────────────────────────────────

#[test]
fn advisory_dose_fills_an_empty_dose_channel() {
    let mut svc = service(SystemConfig::default());
    // Healthy reading: the rules propose no dose of their own.
    let mut rig = MockRig::with_reading(reading(6.0, 1.6, 22.0, 60.0, 800.0));
    let mut history = history_with_trends(96.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();
    let mut advisor = StubAdvisor::suggesting(vec![Action::Dose {
        pump: Pump::NutrientA,
        ml: 8.0,
        reason: "advisor tops up part A".into(),
    }]);

    svc.run_cycle(&mut rig, &mut history, Some(&mut advisor), &mut sink, Utc::now())
        .unwrap();

    assert!(advisor.called);
    assert_eq!(executed_doses(&rig.calls), vec![(Pump::NutrientA, 8.0)]);
}

#[test]
fn rule_dose_shadows_advisory_dose() {
    let mut svc = service(SystemConfig::default());
    let mut rig = MockRig::with_reading(reading(6.8, 1.6, 22.0, 60.0, 800.0));
    let mut history = history_with_trends(85.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();
    let mut advisor = StubAdvisor::suggesting(vec![Action::Dose {
        pump: Pump::NutrientA,
        ml: 25.0,
        reason: "advisor".into(),
    }]);

    svc.run_cycle(&mut rig, &mut history, Some(&mut advisor), &mut sink, Utc::now())
        .unwrap();

    // Only the rule engine's pH dose ran; the advisory dose was
    // shadowed on the occupied channel.
    assert_eq!(executed_doses(&rig.calls), vec![(Pump::Ph, 1.0)]);
}

#[test]
fn unavailable_advisor_degrades_to_rules_only() {
    let mut svc = service(SystemConfig::default());
    let mut rig = MockRig::with_reading(reading(6.8, 1.6, 22.0, 60.0, 800.0));
    let mut history = history_with_trends(85.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();
    let mut advisor = DownAdvisor;

    let summary = svc
        .run_cycle(&mut rig, &mut history, Some(&mut advisor), &mut sink, Utc::now())
        .unwrap();

    assert!(summary.success);
    assert_eq!(executed_doses(&rig.calls), vec![(Pump::Ph, 1.0)]);
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, CycleEvent::AdvisoryUnavailable { .. })));
}

// ── Ledger across cycles ──────────────────────────────────────

#[test]
fn daily_ledger_blocks_advisory_doses_past_the_cumulative_limit() {
    // Advisory doses are gated at execution against the live ledger.
    let mut config = SystemConfig::default();
    config.safety.daily_dose_limit_ml = 2.5;
    let mut svc = service(config);
    let mut history = history_with_trends(96.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();

    // A healthy reading keeps the rules quiet; the advisor pushes
    // 1.0 ml of part A every cycle. The third would total 3.0 ml.
    let mut total_doses = 0;
    for cycle in 0..3 {
        let mut rig = MockRig::with_reading(reading(6.0, 1.6, 22.0, 60.0, 800.0));
        let mut advisor = StubAdvisor::suggesting(vec![Action::Dose {
            pump: Pump::NutrientA,
            ml: 1.0,
            reason: "advisor".into(),
        }]);
        let summary = svc
            .run_cycle(&mut rig, &mut history, Some(&mut advisor), &mut sink, Utc::now())
            .unwrap();
        total_doses += executed_doses(&rig.calls).len();

        if cycle == 2 {
            assert_eq!(summary.skipped.len(), 1);
            assert!(summary.skipped[0].reason.contains("daily dose limit"));
        }
    }

    assert_eq!(total_doses, 2);
    assert!((svc.ledger().total_ml(Pump::NutrientA) - 2.0).abs() < 1e-9);
}

#[test]
fn rule_engine_withholds_doses_when_ledger_nears_the_limit() {
    // Rule-engine doses are gated during evaluation, against the
    // unscaled volume: once the day's total leaves no room for a full
    // 2.0 ml adjustment, the rule reports itself withheld.
    let mut config = SystemConfig::default();
    config.safety.daily_dose_limit_ml = 3.5;
    let mut svc = service(config);
    let mut history = history_with_trends(85.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();

    let mut total_doses = 0;
    let mut last_summary = None;
    for _ in 0..3 {
        let mut rig = MockRig::with_reading(reading(6.8, 1.6, 22.0, 60.0, 800.0));
        let summary = svc
            .run_cycle(&mut rig, &mut history, None, &mut sink, Utc::now())
            .unwrap();
        total_doses += executed_doses(&rig.calls).len();
        last_summary = Some(summary);
    }

    // Cycles 1 and 2 dose 1.0 ml each (halved from 2.0); cycle 3's
    // evaluation sees 2.0 + 2.0 > 3.5 and withholds.
    assert_eq!(total_doses, 2);
    let summary = last_summary.unwrap();
    assert!(summary
        .findings
        .iter()
        .any(|f| f.rule == "ph_adjustment" && f.narrative.contains("withheld")));
    assert!((svc.ledger().total_ml(Pump::Ph) - 2.0).abs() < 1e-9);
}

// ── Failure isolation ─────────────────────────────────────────

#[test]
fn actuator_failure_is_recorded_not_fatal_and_ledger_untouched() {
    let mut svc = service(SystemConfig::default());
    let mut rig = MockRig::with_reading(reading(6.8, 1.6, 22.0, 60.0, 800.0));
    rig.fail_actuators = Some(verdant::error::ActuatorError::NotAcknowledged);
    let mut history = history_with_trends(85.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();

    let summary = svc
        .run_cycle(&mut rig, &mut history, None, &mut sink, Utc::now())
        .unwrap();

    assert!(!summary.success);
    assert_eq!(summary.errors.len(), 1);
    // A failed dose never credits the ledger.
    assert_eq!(svc.ledger().total_ml(Pump::Ph), 0.0);
    // The failed pass is still stored, marked unsuccessful.
    assert_eq!(history.actions().len(), 1);
    assert!(!history.actions()[0].success);
}

#[test]
fn sensor_fault_fails_the_cycle_but_not_the_next_one() {
    let mut svc = service(SystemConfig::default());
    let mut history = history_with_trends(96.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();

    let mut rig = MockRig::with_reading(reading(6.0, 1.6, 22.0, 60.0, 800.0));
    rig.fail_sensors = Some(SensorError::Timeout);
    let err = svc
        .run_cycle(&mut rig, &mut history, None, &mut sink, Utc::now())
        .unwrap_err();
    assert!(matches!(err, Error::Sensor(SensorError::Timeout)));
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, CycleEvent::CycleFailed { .. })));

    // The next cycle runs normally.
    rig.fail_sensors = None;
    let summary = svc
        .run_cycle(&mut rig, &mut history, None, &mut sink, Utc::now())
        .unwrap();
    assert!(summary.success);
    assert_eq!(summary.cycle, 2);
}

// ── Environmental + recommendations ───────────────────────────

#[test]
fn hot_humid_cycle_commands_fan_and_records_reservoir_recommendation() {
    let mut svc = service(SystemConfig::default());
    let mut rig = MockRig::with_reading(reading(6.0, 1.6, 28.0, 85.0, 800.0));
    let mut history = MemoryHistory::new();
    history.set_reservoir_changed_at(Utc::now() - Duration::days(20));
    let mut sink = RecordingSink::new();

    let summary = svc
        .run_cycle(&mut rig, &mut history, None, &mut sink, Utc::now())
        .unwrap();

    // Cooling and humidity rules both fired fan commands.
    let fan_calls: Vec<_> = rig
        .calls
        .iter()
        .filter(|c| matches!(c, ActuatorCall::SetFan { .. }))
        .collect();
    assert_eq!(fan_calls.len(), 2);

    // 20 days > the 14-day GREENS cadence: reservoir change surfaced as
    // a recommendation, not an actuation.
    assert_eq!(summary.recommendations.len(), 1);
    assert!(matches!(
        summary.recommendations[0],
        Action::ReservoirChange { .. }
    ));
}

// ── Command surface ───────────────────────────────────────────

#[test]
fn emergency_stop_command_halts_the_rig() {
    use verdant::app::commands::ControlCommand;

    let mut svc = service(SystemConfig::default());
    let mut rig = MockRig::with_reading(reading(6.0, 1.6, 22.0, 60.0, 800.0));
    let mut history = MemoryHistory::new();
    let mut sink = RecordingSink::new();

    let result = svc
        .handle_command(
            ControlCommand::EmergencyStop {
                reason: "operator request".into(),
            },
            &mut rig,
            &mut history,
            None,
            &mut sink,
            Utc::now(),
        )
        .unwrap();

    assert!(result.is_none());
    assert!(rig.stopped());
}

#[test]
fn config_hot_reload_changes_subsequent_decisions() {
    use verdant::app::commands::ControlCommand;

    let mut svc = service(SystemConfig::default());
    let mut rig = MockRig::with_reading(reading(6.8, 1.6, 22.0, 60.0, 800.0));
    let mut history = history_with_trends(85.0, 96.0, 0.9, 40.0);
    let mut sink = RecordingSink::new();

    // Double the reservoir: the same pH deviation now needs twice the
    // volume (4.0 ml, halved to 2.0 by the stability filter).
    let mut bigger = SystemConfig::default();
    bigger.reservoir_volume_l = 40.0;
    svc.handle_command(
        ControlCommand::UpdateConfig(bigger),
        &mut rig,
        &mut history,
        None,
        &mut sink,
        Utc::now(),
    )
    .unwrap();

    svc.run_cycle(&mut rig, &mut history, None, &mut sink, Utc::now())
        .unwrap();
    assert_eq!(executed_doses(&rig.calls), vec![(Pump::Ph, 2.0)]);
}

// ── Rollups ───────────────────────────────────────────────────

#[test]
fn rollup_pass_stores_every_period_with_data() {
    let svc = service(SystemConfig::default());
    let now = Utc::now();
    let mut history = MemoryHistory::with_now(now);
    for minutes in [10i64, 30, 90, 300, 2000] {
        let mut r = reading(6.0, 1.6, 22.0, 60.0, 800.0);
        r.timestamp = now - Duration::minutes(minutes);
        history.push_reading(r);
    }

    let stored = svc.run_rollup(&mut history);

    // All four windows have at least one reading in range.
    assert_eq!(stored.len(), 4);
    assert_eq!(history.rollups().len(), 4);
    assert_eq!(stored[0].period, PeriodLabel::OneHour);
    assert_eq!(stored[0].reading_count, 2);
    assert_eq!(stored[3].period, PeriodLabel::Week);
    assert_eq!(stored[3].reading_count, 5);
}
