//! Action types and rule findings.
//!
//! A closed tagged union replaces the original free-form decision
//! payloads, so the combiner's precedence rules are exhaustively
//! checked at compile time: adding a variant forces every consumer to
//! say what it does with it.

use serde::{Deserialize, Serialize};

use crate::safety::Pump;

/// One corrective action proposed by the rule engine (or the advisor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Run a dosing pump for `ml` millilitres.
    Dose { pump: Pump, ml: f64, reason: String },
    /// Set circulation fan speed, optionally auto-reverting after
    /// `duration_mins`.
    Fan {
        speed_pct: u8,
        duration_mins: Option<u16>,
        reason: String,
    },
    /// Set LED drive power.
    Led { power_pct: u8, reason: String },
    /// Recommend a configuration change. Deliberately non-actuating:
    /// correction happens by moving the setpoint, not by dosing.
    ConfigChange {
        change: ConfigAdjustment,
        reason: String,
    },
    /// The reservoir is due for a manual change.
    ReservoirChange { reason: String },
    /// Stop every actuator immediately.
    EmergencyStop { reason: String },
}

/// The configuration fields a rule may recommend adjusting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigAdjustment {
    /// Lower (or raise) the EC setpoint to the given value.
    EcTarget(f64),
}

impl Action {
    /// The control channel this action occupies, for combiner
    /// precedence. Recommendations have no channel — they contend with
    /// nothing.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Self::Dose { .. } => Some(Channel::Dose),
            Self::Fan { .. } => Some(Channel::Fan),
            Self::Led { .. } => Some(Channel::Led),
            Self::ConfigChange { .. } | Self::ReservoirChange { .. } | Self::EmergencyStop { .. } => {
                None
            }
        }
    }

    pub fn is_dose(&self) -> bool {
        matches!(self, Self::Dose { .. })
    }
}

/// A physical control channel. Rule-engine decisions on a channel
/// always shadow advisory suggestions for the same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Dose,
    Fan,
    Led,
}

/// One rule evaluation outcome. Every evaluated rule produces a
/// finding, fired or not — "nothing to do" is itself audit-worthy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFinding {
    /// Stable rule identifier (e.g. `"ph_adjustment"`).
    pub rule: &'static str,
    /// Human-readable narrative of what the rule saw.
    pub narrative: String,
    /// Proposed action, when the rule fired with one.
    pub action: Option<Action>,
}

impl RuleFinding {
    pub fn observation(rule: &'static str, narrative: impl Into<String>) -> Self {
        Self {
            rule,
            narrative: narrative.into(),
            action: None,
        }
    }

    pub fn with_action(rule: &'static str, narrative: impl Into<String>, action: Action) -> Self {
        Self {
            rule,
            narrative: narrative.into(),
            action: Some(action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_cover_actuating_variants_only() {
        let dose = Action::Dose {
            pump: Pump::Ph,
            ml: 1.0,
            reason: String::new(),
        };
        assert_eq!(dose.channel(), Some(Channel::Dose));

        let rec = Action::ConfigChange {
            change: ConfigAdjustment::EcTarget(1.5),
            reason: String::new(),
        };
        assert_eq!(rec.channel(), None);
    }

    #[test]
    fn action_serializes_with_type_tag() {
        let action = Action::Fan {
            speed_pct: 60,
            duration_mins: Some(20),
            reason: "humidity".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "fan");
        assert_eq!(json["speed_pct"], 60);
    }
}
