//! Inbound commands to the control service.
//!
//! These represent actions requested by the outside world (scheduler,
//! CLI, future API surface) that the
//! [`ControlService`](super::service::ControlService) interprets and
//! acts upon.

use crate::config::SystemConfig;

/// Commands that external adapters can send into the decision core.
#[derive(Debug, Clone)]
pub enum ControlCommand {
    /// Run one control cycle now (scheduled or manual).
    TriggerCycle,

    /// Hot-reload configuration. Validated before it replaces the
    /// running snapshot; an invalid config is rejected and the old one
    /// stays in force.
    UpdateConfig(SystemConfig),

    /// Stop every actuator immediately.
    EmergencyStop { reason: String },
}
