//! Mock rig adapter — simulated sensors and recording actuators.
//!
//! Implements [`SensorPort`] and [`ActuatorPort`] without hardware:
//! readings are plausible values with deterministic jitter around the
//! default targets, and every actuator command is recorded so tests
//! (and the host binary's audit output) can assert on the full command
//! history.

use chrono::{DateTime, Timelike, Utc};
use log::info;

use crate::app::ports::{ActuatorPort, DoseReceipt, SensorPort};
use crate::error::{ActuatorError, SensorError};
use crate::reading::SensorReading;
use crate::safety::Pump;

// ── Actuator call record ──────────────────────────────────────

/// One recorded actuator command.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    Dose { pump: Pump, ml: f64 },
    SetFan { speed_pct: u8, duration_mins: Option<u16> },
    SetLed { power_pct: u8 },
    EmergencyStop,
}

// ── MockRig ───────────────────────────────────────────────────

/// Simulated grow rig. Sensor values wobble deterministically from an
/// internal counter, so two rigs built with the same seed produce the
/// same sequence — randomness would make the integration tests flaky.
pub struct MockRig {
    pub calls: Vec<ActuatorCall>,
    /// Fixed reading override; when set, `read()` returns exactly this.
    pub forced_reading: Option<SensorReading>,
    /// When set, every actuator command fails with this error.
    pub fail_actuators: Option<ActuatorError>,
    /// When set, sensor reads fail with this error.
    pub fail_sensors: Option<SensorError>,
    state: u64,
    now: DateTime<Utc>,
}

impl MockRig {
    pub fn new(seed: u64, now: DateTime<Utc>) -> Self {
        Self {
            calls: Vec::new(),
            forced_reading: None,
            fail_actuators: None,
            fail_sensors: None,
            state: seed.max(1),
            now,
        }
    }

    /// Rig that always returns the given reading.
    pub fn with_reading(reading: SensorReading) -> Self {
        let now = reading.timestamp;
        Self {
            forced_reading: Some(reading),
            ..Self::new(1, now)
        }
    }

    pub fn last_call(&self) -> Option<&ActuatorCall> {
        self.calls.last()
    }

    pub fn stopped(&self) -> bool {
        matches!(self.calls.last(), Some(ActuatorCall::EmergencyStop))
    }

    /// xorshift step mapped into `center ± spread` (uniform-ish). Good
    /// enough for plausible-looking telemetry; not statistics.
    fn jitter(&mut self, center: f64, spread: f64) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        let unit = (x % 10_000) as f64 / 10_000.0; // 0..1
        center + (unit - 0.5) * 2.0 * spread
    }
}

impl SensorPort for MockRig {
    fn read(&mut self) -> Result<SensorReading, SensorError> {
        if let Some(e) = self.fail_sensors {
            return Err(e);
        }
        if let Some(reading) = &self.forced_reading {
            return Ok(reading.clone());
        }

        // Daylight factor follows the same ramp as the LED schedule:
        // zero before 06:00, full from noon, zero after 18:00.
        let hour = f64::from(self.now.hour());
        let light_factor = ((hour - 6.0) / 6.0).clamp(0.0, 1.0) * ((18.0 - hour) / 6.0).clamp(0.0, 1.0);

        let mut reading = SensorReading::empty(self.now);
        reading.water.ph = Some(round2(self.jitter(6.0, 0.1)));
        reading.water.ec = Some(round2(self.jitter(1.8, 0.05)));
        reading.water.turbidity = Some(round1(self.jitter(5.0, 1.0)));
        reading.water.temperature = Some(round1(self.jitter(22.0, 0.5)));
        reading.water.level_high = Some(true);
        reading.water.level_low = Some(true);
        reading.air.temperature = Some(round1(self.jitter(24.0, 1.0)));
        reading.air.humidity = Some(round1(self.jitter(65.0, 5.0)));
        reading.air.pressure = Some(round1(self.jitter(1013.0, 10.0)));
        reading.air.co2 = Some(self.jitter(400.0, 50.0).round());
        reading.root.temperature = Some(round1(self.jitter(21.0, 0.5)));
        reading.light.lux = Some((light_factor * 30_000.0 + self.jitter(0.0, 1000.0)).max(0.0).round());
        reading.light.led_power = Some((light_factor * 100.0) as u8);
        Ok(reading)
    }
}

impl ActuatorPort for MockRig {
    fn dose(&mut self, pump: Pump, ml: f64) -> Result<DoseReceipt, ActuatorError> {
        if let Some(e) = self.fail_actuators {
            return Err(e);
        }
        self.calls.push(ActuatorCall::Dose { pump, ml });
        info!("[mock] dosing {pump}: {ml}ml");
        Ok(DoseReceipt {
            pump,
            ml,
            duration_secs: ml / pump.flow_rate_ml_per_s(),
        })
    }

    fn set_fan(
        &mut self,
        speed_pct: u8,
        duration_mins: Option<u16>,
    ) -> Result<(), ActuatorError> {
        if let Some(e) = self.fail_actuators {
            return Err(e);
        }
        self.calls.push(ActuatorCall::SetFan {
            speed_pct,
            duration_mins,
        });
        info!("[mock] fan set to {speed_pct}%");
        Ok(())
    }

    fn set_led(&mut self, power_pct: u8) -> Result<(), ActuatorError> {
        if let Some(e) = self.fail_actuators {
            return Err(e);
        }
        self.calls.push(ActuatorCall::SetLed { power_pct });
        info!("[mock] LED set to {power_pct}%");
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), ActuatorError> {
        // The stop path must work even when ordinary commands fail.
        self.calls.push(ActuatorCall::EmergencyStop);
        info!("[mock] EMERGENCY STOP — all actuators off");
        Ok(())
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_are_deterministic_per_seed() {
        let now = Utc::now();
        let a = MockRig::new(42, now).read().unwrap();
        let b = MockRig::new(42, now).read().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dose_receipt_uses_flow_rate() {
        let mut rig = MockRig::new(1, Utc::now());
        let receipt = rig.dose(Pump::Ph, 5.0).unwrap();
        assert!((receipt.duration_secs - 5.0).abs() < 1e-9); // 1 ml/s
        let receipt = rig.dose(Pump::NutrientA, 5.0).unwrap();
        assert!((receipt.duration_secs - 2.0).abs() < 1e-9); // 2.5 ml/s
    }

    #[test]
    fn emergency_stop_works_even_when_actuators_fail() {
        let mut rig = MockRig::new(1, Utc::now());
        rig.fail_actuators = Some(ActuatorError::NotAcknowledged);
        assert!(rig.dose(Pump::Ph, 1.0).is_err());
        assert!(rig.emergency_stop().is_ok());
        assert!(rig.stopped());
    }
}
