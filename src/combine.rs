//! Decision combiner — merges rule-engine output with advisory input.
//!
//! The rule engine is authoritative. The advisor (an LLM or any other
//! external suggestion source) only ever fills channels the rules left
//! empty: an advisory dose is used when the rules proposed no dose this
//! cycle, an advisory fan/LED setting when the rules made no decision
//! on that channel. Advisory recommendations outside those channels are
//! discarded. An emergency rollback collapses the whole cycle's output
//! to a single stop action.

use log::{info, warn};

use crate::rules::{Action, Channel, RollbackState};

/// A non-authoritative suggestion set from an external advisor.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryPlan {
    pub actions: Vec<Action>,
    /// Advisor's self-reported confidence, 0–1. Recorded for audit;
    /// never used to override rule precedence.
    pub confidence: f64,
    pub reasoning: String,
}

/// Merges filtered rule actions with an optional advisory plan.
#[derive(Debug, Default)]
pub struct DecisionCombiner;

impl DecisionCombiner {
    pub fn new() -> Self {
        Self
    }

    /// Produce the final action set for this cycle.
    pub fn combine(
        &self,
        rule_actions: Vec<Action>,
        rollback: &RollbackState,
        advisory: Option<&AdvisoryPlan>,
    ) -> Vec<Action> {
        // Emergency rollback discards every other proposal.
        if rollback.required {
            return vec![Action::EmergencyStop {
                reason: rollback.reason.clone(),
            }];
        }

        let rules_dosed = rule_actions.iter().any(|a| a.channel() == Some(Channel::Dose));
        let rules_fan = rule_actions.iter().any(|a| a.channel() == Some(Channel::Fan));
        let rules_led = rule_actions.iter().any(|a| a.channel() == Some(Channel::Led));

        let mut combined = rule_actions;

        if let Some(plan) = advisory {
            for action in &plan.actions {
                let accept = match action.channel() {
                    Some(Channel::Dose) => !rules_dosed,
                    Some(Channel::Fan) => !rules_fan,
                    Some(Channel::Led) => !rules_led,
                    // Config changes, reservoir schedules and emergency
                    // stops are rule-engine territory only.
                    None => false,
                };

                if accept {
                    info!(
                        "accepting advisory action (confidence {:.2}): {action:?}",
                        plan.confidence
                    );
                    combined.push(action.clone());
                } else {
                    warn!("advisory action shadowed by rule engine: {action:?}");
                }
            }
        }

        combined
    }
}
