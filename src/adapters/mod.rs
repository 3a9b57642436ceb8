//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements                | Connects to            |
//! |-----------------|---------------------------|------------------------|
//! | `mock_rig`      | SensorPort + ActuatorPort | simulated grow rig     |
//! | `memory_history`| HistoryPort               | in-memory Vec store    |
//! | `log_sink`      | EventSink                 | the process logger     |
//!
//! Production deployments swap in adapters for the real sensor bus,
//! GPIO pump drivers and the SQLite store; the domain core does not
//! change.

pub mod log_sink;
pub mod memory_history;
pub mod mock_rig;
