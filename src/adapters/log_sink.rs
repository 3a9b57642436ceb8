//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured cycle events to the
//! logger. A database audit-table or MQTT adapter would implement the
//! same trait.

use log::{info, warn};

use crate::app::events::CycleEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`CycleEvent`].
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CycleEvent) {
        match event {
            CycleEvent::CycleStarted { cycle, timestamp } => {
                info!("CYCLE {cycle} | started at {timestamp}");
            }
            CycleEvent::CycleSkipped { reason } => {
                warn!("CYCLE | skipped: {reason}");
            }
            CycleEvent::LedgerReset { day } => {
                info!("LEDGER | reset for {day}");
            }
            CycleEvent::Frozen { reason, until } => {
                info!("FREEZE | {reason} (until {until:?})");
            }
            CycleEvent::RollbackTriggered { reason } => {
                warn!("ROLLBACK | {reason}");
            }
            CycleEvent::ActionExecuted { action } => {
                info!("ACTION | executed: {action:?}");
            }
            CycleEvent::ActionRejected { action, violation } => {
                warn!("ACTION | rejected ({violation}): {action:?}");
            }
            CycleEvent::ActuatorFailed { action, error } => {
                warn!("ACTION | actuator failed ({error}): {action:?}");
            }
            CycleEvent::RecommendationRecorded { action } => {
                info!("RECOMMEND | {action:?}");
            }
            CycleEvent::AdvisoryUnavailable { reason } => {
                warn!("ADVISORY | unavailable: {reason}");
            }
            CycleEvent::CycleCompleted(summary) => {
                info!(
                    "CYCLE {} | done in {}ms | health={:.3} factor={:.1} | \
                     {} executed, {} skipped, {} recommendations, {} errors",
                    summary.cycle,
                    summary.duration_ms,
                    summary.health_score,
                    summary.stability_factor,
                    summary.executed.len(),
                    summary.skipped.len(),
                    summary.recommendations.len(),
                    summary.errors.len(),
                );
            }
            CycleEvent::CycleFailed {
                cycle,
                error,
                timestamp,
            } => {
                warn!("CYCLE {cycle} | FAILED at {timestamp}: {error}");
            }
        }
    }
}

/// Test sink that keeps every event for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<CycleEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CycleEvent) {
        self.events.push(event.clone());
    }
}
