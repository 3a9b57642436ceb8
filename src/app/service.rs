//! Control service — the hexagonal core.
//!
//! [`ControlService`] owns the configuration snapshot, the KPI and rule
//! engines, the stability filter, the combiner and the daily dose
//! ledger. One call to [`ControlService::run_cycle`] performs one full
//! synchronous decision pass:
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  HistoryPort ──▶│        ControlService        │ ──▶ HistoryPort
//!                 │ KPIs · Rules · Filter · Merge│
//!  Advisor ──────▶│        Safety gate           │
//!                 └──────────────┬───────────────┘
//!                                ▼
//!                          ActuatorPort
//! ```
//!
//! All sub-steps are sequential and deterministic given fixed inputs.
//! The ledger is the only mutating shared resource, and it is written
//! exclusively here, after a pump confirms execution.

use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use log::{error, info, warn};

use crate::combine::{AdvisoryPlan, DecisionCombiner};
use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::filter::StabilityFilter;
use crate::kpi::{DosingTotals, KpiEngine, PeriodKpi, PeriodLabel};
use crate::rules::{Action, RuleEngine};
use crate::safety::{DailyDoseLedger, DoseVerdict, Pump};

use super::commands::ControlCommand;
use super::events::{CycleEvent, CycleSummary, SkippedAction};
use super::ports::{ActionRecord, ActuatorPort, Advisor, EventSink, HistoryPort, SensorPort};

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

/// The decision core orchestrator.
pub struct ControlService {
    config: SystemConfig,
    kpi: KpiEngine,
    rules: RuleEngine,
    filter: StabilityFilter,
    combiner: DecisionCombiner,
    ledger: DailyDoseLedger,
    cycle_count: u64,
    /// Guards against overlapping cycles: concurrent dosing decisions
    /// against a single reservoir are unsafe, so a trigger that arrives
    /// mid-cycle is skipped, never queued behind a lock.
    in_cycle: bool,
}

impl ControlService {
    /// Construct the service from a validated configuration snapshot.
    pub fn new(config: SystemConfig, today: chrono::NaiveDate) -> Self {
        Self {
            config,
            kpi: KpiEngine::new(),
            rules: RuleEngine::new(),
            filter: StabilityFilter::new(),
            combiner: DecisionCombiner::new(),
            ledger: DailyDoseLedger::new(today),
            cycle_count: 0,
            in_cycle: false,
        }
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full control cycle: read → KPIs → rules → filter →
    /// combine → execute. Returns the cycle summary, or a structured
    /// error when the cycle failed wholesale. A failed cycle never
    /// prevents the next one from running.
    pub fn run_cycle(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        history: &mut impl HistoryPort,
        mut advisor: Option<&mut dyn Advisor>,
        sink: &mut impl EventSink,
        now: DateTime<Utc>,
    ) -> Result<CycleSummary> {
        if self.in_cycle {
            warn!("cycle trigger while a cycle is in flight — skipping");
            sink.emit(&CycleEvent::CycleSkipped {
                reason: "previous cycle still executing",
            });
            return Err(Error::CycleInFlight);
        }

        self.in_cycle = true;
        let result = self.run_cycle_inner(hw, history, advisor.as_deref_mut(), sink, now);
        self.in_cycle = false;

        if let Err(e) = &result {
            error!("control cycle failed: {e}");
            sink.emit(&CycleEvent::CycleFailed {
                cycle: self.cycle_count,
                error: e.to_string(),
                timestamp: now,
            });
        }
        result
    }

    fn run_cycle_inner(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        history: &mut impl HistoryPort,
        advisor: Option<&mut (dyn Advisor + '_)>,
        sink: &mut impl EventSink,
        now: DateTime<Utc>,
    ) -> Result<CycleSummary> {
        let started = Instant::now();
        self.cycle_count += 1;
        info!("starting control cycle {}", self.cycle_count);
        sink.emit(&CycleEvent::CycleStarted {
            cycle: self.cycle_count,
            timestamp: now,
        });

        // Ledger day rollover happens before any limit check.
        let today = now.with_timezone(&Local).date_naive();
        if self.ledger.reset_if_new_day(today) {
            sink.emit(&CycleEvent::LedgerReset { day: today });
        }

        // 1. Sensors. A hard interface fault aborts the cycle; partial
        //    data flows through as absent fields.
        let reading = hw.read().map_err(Error::Sensor)?;

        // 2. Current KPIs from the reading plus trailing-24h history.
        let recent_actions = history.recent_actions(24);
        let dosing_24h = DosingTotals::from_records(&recent_actions);
        let days_since_change = history.days_since_reservoir_change(now).unwrap_or(0);
        let kpis = self
            .kpi
            .current_kpis(&reading, &self.config.targets, dosing_24h, days_since_change);

        // 3. Trends from the stored rollups; too little history reads
        //    as neutral downstream.
        let rollups = history.kpi_history(7);
        let trends = match self.kpi.trends(&rollups) {
            Ok(t) => Some(t),
            Err(e) => {
                info!("trend analysis unavailable: {e}");
                None
            }
        };

        // 4. Rule evaluation, gates first.
        let evaluation =
            self.rules
                .evaluate(&self.config, &reading, &kpis, trends.as_ref(), &self.ledger, now);

        if evaluation.freeze.frozen {
            sink.emit(&CycleEvent::Frozen {
                reason: evaluation.freeze.reason.clone(),
                until: evaluation.freeze.freeze_until,
            });
        }
        if evaluation.rollback.required {
            sink.emit(&CycleEvent::RollbackTriggered {
                reason: evaluation.rollback.reason.clone(),
            });
        }

        // 5. Stable-unless-better throttle on the rule actions.
        let filtered = self.filter.apply(evaluation.actions(), &kpis);

        // 6. Advisory input. Not consulted while frozen — a frozen
        //    system has decided to do nothing, and that decision is
        //    authoritative too.
        let advisory = if evaluation.freeze.frozen {
            None
        } else {
            self.consult_advisor(advisor, &reading, &kpis, &recent_actions, sink)
        };

        // 7. Merge, with rule precedence per channel.
        let final_actions =
            self.combiner
                .combine(filtered.actions, &evaluation.rollback, advisory.as_ref());

        // 8. Execute, safety-gating every dose against the live ledger.
        let execution = self.execute(final_actions, hw, sink);

        if execution.touched_actuators() {
            history.record_action(execution.to_record(now));
        }

        let summary = CycleSummary {
            cycle: self.cycle_count,
            timestamp: now,
            duration_ms: started.elapsed().as_millis() as u64,
            success: execution.errors.is_empty(),
            health_score: kpis.health_score,
            stability_factor: filtered.stability_factor,
            frozen: evaluation.freeze.frozen,
            rollback: evaluation.rollback.required,
            findings: evaluation.findings,
            executed: execution.executed,
            skipped: execution.skipped,
            recommendations: execution.recommendations,
            errors: execution.errors,
        };

        info!(
            "control cycle {} completed in {}ms ({} executed, {} skipped, {} errors)",
            summary.cycle,
            summary.duration_ms,
            summary.executed.len(),
            summary.skipped.len(),
            summary.errors.len()
        );
        sink.emit(&CycleEvent::CycleCompleted(summary.clone()));
        Ok(summary)
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command. Returns the cycle summary when the
    /// command ran a cycle.
    pub fn handle_command(
        &mut self,
        command: ControlCommand,
        hw: &mut (impl SensorPort + ActuatorPort),
        history: &mut impl HistoryPort,
        advisor: Option<&mut dyn Advisor>,
        sink: &mut impl EventSink,
        now: DateTime<Utc>,
    ) -> Result<Option<CycleSummary>> {
        match command {
            ControlCommand::TriggerCycle => {
                self.run_cycle(hw, history, advisor, sink, now).map(Some)
            }
            ControlCommand::UpdateConfig(new_config) => {
                new_config.validate()?;
                self.config = new_config;
                info!("configuration updated at runtime");
                Ok(None)
            }
            ControlCommand::EmergencyStop { reason } => {
                let action = Action::EmergencyStop {
                    reason: reason.clone(),
                };
                warn!("EMERGENCY STOP requested: {reason}");
                hw.emergency_stop().map_err(Error::Actuator)?;
                sink.emit(&CycleEvent::ActionExecuted { action });
                Ok(None)
            }
        }
    }

    // ── KPI rollups ───────────────────────────────────────────

    /// Compute and store KPI rollups for the standard period set.
    /// Windows with no data are skipped quietly.
    pub fn run_rollup(&self, history: &mut impl HistoryPort) -> Vec<PeriodKpi> {
        let mut stored = Vec::new();
        for period in PeriodLabel::ALL {
            let readings = history.recent_readings(period.hours());
            let actions = history.recent_actions(period.hours());
            match self
                .kpi
                .period_kpis(&readings, &actions, &self.config.targets, period)
            {
                Ok(rollup) => {
                    history.store_rollup(&rollup);
                    stored.push(rollup);
                }
                Err(e) => info!("rollup {} skipped: {e}", period.as_str()),
            }
        }
        stored
    }

    // ── Queries ───────────────────────────────────────────────

    /// Clone of the live configuration.
    pub fn current_config(&self) -> SystemConfig {
        self.config.clone()
    }

    /// Read access to today's dose ledger.
    pub fn ledger(&self) -> &DailyDoseLedger {
        &self.ledger
    }

    /// Total control cycles executed since startup.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn consult_advisor(
        &self,
        advisor: Option<&mut (dyn Advisor + '_)>,
        reading: &crate::reading::SensorReading,
        kpis: &crate::kpi::KpiSnapshot,
        recent_actions: &[ActionRecord],
        sink: &mut impl EventSink,
    ) -> Option<AdvisoryPlan> {
        let advisor = advisor?;
        match advisor.suggest(reading, kpis, recent_actions) {
            Ok(plan) => {
                info!(
                    "advisory plan received: {} action(s), confidence {:.2}",
                    plan.actions.len(),
                    plan.confidence
                );
                Some(plan)
            }
            Err(e) => {
                warn!("advisory unavailable, continuing rules-only: {e}");
                sink.emit(&CycleEvent::AdvisoryUnavailable {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Dispatch the final action set to the actuator port. Every dose
    /// is re-checked against the safety limits and the live ledger at
    /// the last moment before dispatch; the ledger is credited only on
    /// a confirmed receipt.
    fn execute(
        &mut self,
        actions: Vec<Action>,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome::default();

        for action in actions {
            match &action {
                Action::Dose { pump, ml, .. } => {
                    match self.config.safety.check_dose(*pump, *ml, &self.ledger) {
                        DoseVerdict::Safe => match hw.dose(*pump, *ml) {
                            Ok(receipt) => {
                                self.ledger.record(*pump, *ml);
                                info!(
                                    "dosed {}: {:.1}ml over {:.1}s",
                                    pump, receipt.ml, receipt.duration_secs
                                );
                                outcome.add_dose(*pump, *ml);
                                sink.emit(&CycleEvent::ActionExecuted {
                                    action: action.clone(),
                                });
                                outcome.executed.push(action);
                            }
                            Err(e) => outcome.actuator_failed(action, e, sink),
                        },
                        DoseVerdict::Rejected(violation) => {
                            warn!("dose rejected: {violation}");
                            sink.emit(&CycleEvent::ActionRejected {
                                action: action.clone(),
                                violation,
                            });
                            outcome.skipped.push(SkippedAction {
                                action,
                                reason: violation.to_string(),
                            });
                        }
                    }
                }
                Action::Fan { speed_pct, duration_mins, .. } => {
                    let speed = (*speed_pct).min(self.config.safety.fan_max_speed);
                    match hw.set_fan(speed, *duration_mins) {
                        Ok(()) => {
                            info!("fan set to {speed}%");
                            outcome.fan_speed = Some(speed);
                            sink.emit(&CycleEvent::ActionExecuted {
                                action: action.clone(),
                            });
                            outcome.executed.push(action);
                        }
                        Err(e) => outcome.actuator_failed(action, e, sink),
                    }
                }
                Action::Led { power_pct, .. } => {
                    let power = (*power_pct).min(self.config.safety.led_max_power);
                    match hw.set_led(power) {
                        Ok(()) => {
                            info!("LED set to {power}%");
                            outcome.led_power = Some(power);
                            sink.emit(&CycleEvent::ActionExecuted {
                                action: action.clone(),
                            });
                            outcome.executed.push(action);
                        }
                        Err(e) => outcome.actuator_failed(action, e, sink),
                    }
                }
                Action::ConfigChange { .. } | Action::ReservoirChange { .. } => {
                    // Non-actuating: surfaced to the operator, never
                    // applied automatically.
                    info!("recommendation recorded: {action:?}");
                    sink.emit(&CycleEvent::RecommendationRecorded {
                        action: action.clone(),
                    });
                    outcome.recommendations.push(action);
                }
                Action::EmergencyStop { reason } => {
                    warn!("EMERGENCY STOP: {reason}");
                    match hw.emergency_stop() {
                        Ok(()) => {
                            outcome.stopped = true;
                            sink.emit(&CycleEvent::ActionExecuted {
                                action: action.clone(),
                            });
                            outcome.executed.push(action);
                        }
                        Err(e) => outcome.actuator_failed(action, e, sink),
                    }
                }
            }
        }

        outcome
    }
}

// ───────────────────────────────────────────────────────────────
// Execution bookkeeping
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct ExecutionOutcome {
    executed: Vec<Action>,
    skipped: Vec<SkippedAction>,
    recommendations: Vec<Action>,
    errors: Vec<String>,
    dosed_ml: [f64; 3], // pump A, pump B, pH pump
    fan_speed: Option<u8>,
    led_power: Option<u8>,
    stopped: bool,
}

impl ExecutionOutcome {
    fn add_dose(&mut self, pump: Pump, ml: f64) {
        match pump {
            Pump::NutrientA => self.dosed_ml[0] += ml,
            Pump::NutrientB => self.dosed_ml[1] += ml,
            Pump::Ph => self.dosed_ml[2] += ml,
            Pump::Refill => {}
        }
    }

    fn actuator_failed(
        &mut self,
        action: Action,
        e: crate::error::ActuatorError,
        sink: &mut impl EventSink,
    ) {
        error!("actuator failure on {action:?}: {e}");
        sink.emit(&CycleEvent::ActuatorFailed {
            action: action.clone(),
            error: e,
        });
        self.errors.push(format!("{action:?}: {e}"));
    }

    fn touched_actuators(&self) -> bool {
        self.dosed_ml.iter().any(|ml| *ml > 0.0)
            || self.fan_speed.is_some()
            || self.led_power.is_some()
            || self.stopped
            || !self.errors.is_empty()
    }

    fn to_record(&self, now: DateTime<Utc>) -> ActionRecord {
        ActionRecord {
            timestamp: now,
            pump_a_ml: self.dosed_ml[0],
            pump_b_ml: self.dosed_ml[1],
            ph_pump_ml: self.dosed_ml[2],
            fan_speed: self.fan_speed,
            led_power: self.led_power,
            success: self.errors.is_empty(),
        }
    }
}
