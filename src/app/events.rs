//! Outbound application events and the per-cycle summary.
//!
//! The [`ControlService`](super::service::ControlService) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on
//! the other side decide what to do with them — log them, store them as
//! audit rows, publish them. Nothing in the core depends on the answer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{ActuatorError, SafetyViolation};
use crate::rules::{Action, RuleFinding};

/// Structured events emitted by the decision core.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// A control cycle began.
    CycleStarted { cycle: u64, timestamp: DateTime<Utc> },

    /// A trigger arrived while a cycle was still executing; it was
    /// skipped, never run concurrently.
    CycleSkipped { reason: &'static str },

    /// The daily dose ledger rolled over at local midnight.
    LedgerReset { day: NaiveDate },

    /// The freeze gate engaged: performance is excellent, adjustments
    /// are suspended.
    Frozen {
        reason: String,
        until: Option<DateTime<Utc>>,
    },

    /// The rollback gate engaged: health degraded sharply.
    RollbackTriggered { reason: String },

    /// An action was executed and acknowledged.
    ActionExecuted { action: Action },

    /// A dose was rejected by the safety limiter and dropped.
    ActionRejected {
        action: Action,
        violation: SafetyViolation,
    },

    /// An actuator failed to execute or acknowledge a command.
    ActuatorFailed {
        action: Action,
        error: ActuatorError,
    },

    /// A non-actuating recommendation (config change, reservoir change)
    /// was recorded for the operator.
    RecommendationRecorded { action: Action },

    /// The advisory source was unavailable; the cycle ran rules-only.
    AdvisoryUnavailable { reason: String },

    /// The cycle finished with a full summary.
    CycleCompleted(CycleSummary),

    /// The cycle failed wholesale.
    CycleFailed {
        cycle: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Everything that happened in one control cycle, suitable for audit
/// storage or JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,

    pub health_score: f64,
    pub stability_factor: f64,
    pub frozen: bool,
    pub rollback: bool,

    /// Every rule finding this cycle, fired or not.
    pub findings: Vec<RuleFinding>,
    /// Actions executed and acknowledged.
    pub executed: Vec<Action>,
    /// Actions dropped by the safety limiter, with the reason.
    pub skipped: Vec<SkippedAction>,
    /// Non-actuating recommendations surfaced to the operator.
    pub recommendations: Vec<Action>,
    /// Actuator failures, as display strings.
    pub errors: Vec<String>,
}

/// A dropped action plus the safety reason it was dropped for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAction {
    pub action: Action,
    pub reason: String,
}
