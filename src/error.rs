//! Unified error types for the Verdant controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the control cycle's error handling uniform. Nothing in the decision
//! core panics or escapes unhandled: a rule that cannot read its inputs
//! skips itself, a rejected dose is dropped and logged, and a failed
//! cycle surfaces a structured error plus an audit event — it never
//! stops subsequent cycles from running.

use std::fmt;

use crate::safety::Pump;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the decision core funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A sensor read failed outright (not merely partial data).
    Sensor(SensorError),
    /// A rule's input was missing or invalid; the rule was skipped.
    Input(InputDataError),
    /// A proposed dose violated a safety limit and was dropped.
    Safety(SafetyViolation),
    /// Not enough stored history for the requested aggregate.
    History(HistoryError),
    /// An actuator failed to execute or acknowledge a command.
    Actuator(ActuatorError),
    /// The advisory source was unavailable; the cycle ran rules-only.
    Advisory(AdvisoryError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A cycle trigger arrived while another cycle was still executing.
    CycleInFlight,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Input(e) => write!(f, "input data: {e}"),
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::History(e) => write!(f, "history: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Advisory(e) => write!(f, "advisory: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::CycleInFlight => write!(f, "control cycle already in flight"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// A hard sensor-interface fault. Partial data is *not* an error — the
/// reading struct carries `Option` fields for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor interface did not respond within its deadline.
    Timeout,
    /// The interface returned data that failed basic plausibility checks.
    Implausible(&'static str),
    /// The underlying bus/driver reported a failure.
    BusFault(&'static str),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "read timed out"),
            Self::Implausible(what) => write!(f, "implausible reading: {what}"),
            Self::BusFault(what) => write!(f, "bus fault: {what}"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Rule input errors
// ---------------------------------------------------------------------------

/// Missing or invalid input for a single rule evaluator. One bad sensor
/// field must never block unrelated rules, so these are consumed inside
/// the rule engine, not propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDataError {
    /// A required sensor field was absent from the reading.
    MissingField(&'static str),
}

impl fmt::Display for InputDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing field: {field}"),
        }
    }
}

impl From<InputDataError> for Error {
    fn from(e: InputDataError) -> Self {
        Self::Input(e)
    }
}

// ---------------------------------------------------------------------------
// Safety violations
// ---------------------------------------------------------------------------

/// A dose that failed the safety limiter. Violations never abort a
/// cycle: the offending action is dropped, warn-logged, and recorded in
/// the audit trail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyViolation {
    /// Zero or negative volume — fail safe, nothing to dispense.
    NonPositiveVolume { pump: Pump, ml: f64 },
    /// The volume exceeds the pump's single-dose ceiling.
    SingleDoseExceeded { pump: Pump, ml: f64, limit_ml: f64 },
    /// Dosing would push the pump past its daily cumulative ceiling.
    DailyLimitExceeded {
        pump: Pump,
        would_total_ml: f64,
        limit_ml: f64,
    },
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveVolume { pump, ml } => {
                write!(f, "{pump}: non-positive dose {ml}ml")
            }
            Self::SingleDoseExceeded { pump, ml, limit_ml } => {
                write!(f, "{pump}: dose {ml}ml exceeds single dose limit {limit_ml}ml")
            }
            Self::DailyLimitExceeded {
                pump,
                would_total_ml,
                limit_ml,
            } => {
                write!(
                    f,
                    "{pump}: daily dose limit exceeded: {would_total_ml}ml > {limit_ml}ml"
                )
            }
        }
    }
}

impl From<SafetyViolation> for Error {
    fn from(e: SafetyViolation) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// History errors
// ---------------------------------------------------------------------------

/// Too little stored data for a period aggregate or trend calculation.
/// Downstream rules treat a missing trend as "unknown/neutral".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    /// No readings at all in the requested window.
    NoData,
    /// Fewer rollup points than the calculation requires.
    InsufficientPoints { needed: usize, have: usize },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "no sensor data available for period"),
            Self::InsufficientPoints { needed, have } => {
                write!(f, "insufficient data for trend analysis: {have} points, need {needed}")
            }
        }
    }
}

impl From<HistoryError> for Error {
    fn from(e: HistoryError) -> Self {
        Self::History(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

/// An actuator command failed. Logged and recorded as a failed action;
/// the cycle continues with its remaining actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// The actuator did not acknowledge the command.
    NotAcknowledged,
    /// The driver reported an execution failure mid-command.
    ExecutionFailed(&'static str),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAcknowledged => write!(f, "command not acknowledged"),
            Self::ExecutionFailed(what) => write!(f, "execution failed: {what}"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Advisory errors
// ---------------------------------------------------------------------------

/// The advisory source failed or produced an unusable suggestion. Always
/// swallowed into "no advisory this cycle" — the advisor is never
/// authoritative and never required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryError {
    /// The advisory backend could not be reached.
    Unavailable(String),
    /// The advisor responded with something that failed validation.
    InvalidResponse(String),
    /// Advisory input is disabled by configuration.
    Disabled,
}

impl fmt::Display for AdvisoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(why) => write!(f, "unavailable: {why}"),
            Self::InvalidResponse(why) => write!(f, "invalid response: {why}"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

impl From<AdvisoryError> for Error {
    fn from(e: AdvisoryError) -> Self {
        Self::Advisory(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Configuration loading or validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The config file could not be read.
    Io(String),
    /// The config file could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;
