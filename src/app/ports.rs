//! Port traits — the hexagonal boundary between the decision core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService (domain)
//! ```
//!
//! Driven adapters (sensor interface, pump/fan/LED drivers, the history
//! store, the advisory client, event sinks) implement these traits. The
//! [`ControlService`](super::service::ControlService) consumes them via
//! generics, so the core never touches hardware, SQLite or a network
//! client directly.
//!
//! ## Contract notes
//!
//! - **HistoryPort** queries return empty collections when nothing is
//!   stored — "no data yet" is a normal state, never an error.
//! - **ActuatorPort** failures are typed; the service logs and records
//!   them but keeps the cycle alive.
//! - **Advisor** is strictly optional and strictly non-authoritative;
//!   an erroring advisor degrades to rules-only operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::combine::AdvisoryPlan;
use crate::error::{ActuatorError, AdvisoryError, SensorError};
use crate::kpi::{KpiSnapshot, PeriodKpi};
use crate::reading::SensorReading;
use crate::safety::Pump;

use super::events::CycleEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: rig → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per cycle.
pub trait SensorPort {
    /// Read every sensor group and return a unified snapshot.
    ///
    /// Partial data is fine — individual fields are `Option`. An `Err`
    /// means the interface itself failed and the cycle cannot proceed.
    fn read(&mut self) -> Result<SensorReading, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → rig)
// ───────────────────────────────────────────────────────────────

/// Confirmation that a dose physically ran.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoseReceipt {
    pub pump: Pump,
    pub ml: f64,
    /// Pump run time derived from volume and calibrated flow rate.
    pub duration_secs: f64,
}

/// Write-side port: the domain calls this to command actuators.
pub trait ActuatorPort {
    /// Dispense `ml` through `pump`. Runs to completion — the driver
    /// must not cancel a dose mid-dispense.
    fn dose(&mut self, pump: Pump, ml: f64) -> Result<DoseReceipt, ActuatorError>;

    /// Set circulation fan speed; `duration_mins` requests auto-revert.
    fn set_fan(&mut self, speed_pct: u8, duration_mins: Option<u16>)
    -> Result<(), ActuatorError>;

    /// Set LED drive power.
    fn set_led(&mut self, power_pct: u8) -> Result<(), ActuatorError>;

    /// Stop every actuator immediately.
    fn emergency_stop(&mut self) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// History port (driven adapter: domain ↔ storage)
// ───────────────────────────────────────────────────────────────

/// One executed (or attempted) actuator pass, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub pump_a_ml: f64,
    pub pump_b_ml: f64,
    pub ph_pump_ml: f64,
    pub fan_speed: Option<u8>,
    pub led_power: Option<u8>,
    /// Whether every commanded actuator acknowledged.
    pub success: bool,
}

/// Query/record side of the storage collaborator.
pub trait HistoryPort {
    /// Sensor readings from the trailing `hours`, oldest first.
    fn recent_readings(&self, hours: u32) -> Vec<SensorReading>;

    /// Actuator records from the trailing `hours`, oldest first.
    fn recent_actions(&self, hours: u32) -> Vec<ActionRecord>;

    /// Stored KPI rollups from the trailing `days`, oldest first.
    fn kpi_history(&self, days: u32) -> Vec<PeriodKpi>;

    /// Days since the reservoir was last changed, when known.
    fn days_since_reservoir_change(&self, now: DateTime<Utc>) -> Option<u32>;

    /// Persist one actuator pass for the audit trail and future KPIs.
    fn record_action(&mut self, record: ActionRecord);

    /// Persist one KPI rollup.
    fn store_rollup(&mut self, rollup: &PeriodKpi);
}

// ───────────────────────────────────────────────────────────────
// Advisory port (driven adapter: domain → external advisor)
// ───────────────────────────────────────────────────────────────

/// Capability-typed advisory source (an LLM behind a network client in
/// production, a stub in tests). The core never depends on a concrete
/// client.
pub trait Advisor {
    fn suggest(
        &mut self,
        reading: &SensorReading,
        kpis: &KpiSnapshot,
        recent_actions: &[ActionRecord],
    ) -> Result<AdvisoryPlan, AdvisoryError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`CycleEvent`]s through this port.
/// Adapters decide where they go (log output, database audit table,
/// MQTT, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &CycleEvent);
}
