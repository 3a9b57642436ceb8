//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the orchestration layer of the Verdant
//! controller: the per-cycle control service, its inbound commands and
//! outbound events. All interaction with sensors, actuators, storage
//! and the advisory source happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without a rig.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
