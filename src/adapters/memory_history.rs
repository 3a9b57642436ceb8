//! In-memory history adapter.
//!
//! Implements [`HistoryPort`] with plain `Vec`s. Backs the host binary
//! and the integration tests; a SQLite adapter would implement the same
//! trait against real tables. Queries filter on the stored timestamps,
//! so tests control time entirely through the records they insert.

use chrono::{DateTime, Duration, Utc};

use crate::app::ports::{ActionRecord, HistoryPort};
use crate::kpi::PeriodKpi;
use crate::reading::SensorReading;

/// Vec-backed history store.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    readings: Vec<SensorReading>,
    actions: Vec<ActionRecord>,
    rollups: Vec<PeriodKpi>,
    reservoir_changed_at: Option<DateTime<Utc>>,
    /// Query reference time; queries measure "recent" backwards from
    /// here. Defaults to each query's call time when unset.
    now: Option<DateTime<Utc>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the reference time for recency queries (tests).
    pub fn with_now(now: DateTime<Utc>) -> Self {
        Self {
            now: Some(now),
            ..Self::default()
        }
    }

    pub fn push_reading(&mut self, reading: SensorReading) {
        self.readings.push(reading);
    }

    pub fn push_rollup(&mut self, rollup: PeriodKpi) {
        self.rollups.push(rollup);
    }

    pub fn set_reservoir_changed_at(&mut self, at: DateTime<Utc>) {
        self.reservoir_changed_at = Some(at);
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn rollups(&self) -> &[PeriodKpi] {
        &self.rollups
    }

    fn reference_now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

impl HistoryPort for MemoryHistory {
    fn recent_readings(&self, hours: u32) -> Vec<SensorReading> {
        let cutoff = self.reference_now() - Duration::hours(i64::from(hours));
        self.readings
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    fn recent_actions(&self, hours: u32) -> Vec<ActionRecord> {
        let cutoff = self.reference_now() - Duration::hours(i64::from(hours));
        self.actions
            .iter()
            .filter(|a| a.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    fn kpi_history(&self, days: u32) -> Vec<PeriodKpi> {
        let cutoff = self.reference_now() - Duration::days(i64::from(days));
        self.rollups
            .iter()
            .filter(|k| k.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    fn days_since_reservoir_change(&self, now: DateTime<Utc>) -> Option<u32> {
        self.reservoir_changed_at
            .map(|at| (now - at).num_days().max(0) as u32)
    }

    fn record_action(&mut self, record: ActionRecord) {
        self.actions.push(record);
    }

    fn store_rollup(&mut self, rollup: &PeriodKpi) {
        self.rollups.push(rollup.clone());
    }
}
