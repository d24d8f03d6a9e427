//! Decision gate - map a diagnosis to a directive.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::types::{Diagnosis, RiskLevel};

const WAIT_ACTION: &str = "Wait for more data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Run the named remediation tool once a human approves.
    Execute,
    /// Hand to a human for investigation; no tool is run.
    Escalate,
    /// Keep observing.
    Wait,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Execute => "execute",
            ActionType::Escalate => "escalate",
            ActionType::Wait => "wait",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do about a diagnosis. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub action_type: ActionType,
    /// Only `Execute` directives name a tool.
    pub tool: Option<String>,
    pub target_action: String,
}

impl Directive {
    pub fn is_execute(&self) -> bool {
        self.action_type == ActionType::Execute
    }
}

/// Threshold logic between diagnosis and action.
#[derive(Debug, Clone, Copy)]
pub struct DecisionGate {
    threshold: f64,
}

impl DecisionGate {
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "escalation threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `Execute` iff `confidence >= threshold`.
    ///
    /// Below the threshold, high-risk diagnoses escalate and the rest wait.
    pub fn decide(&self, diagnosis: &Diagnosis) -> Directive {
        if diagnosis.confidence.value() >= self.threshold {
            let tool = diagnosis
                .tool
                .clone()
                .unwrap_or_else(|| diagnosis.recommended_action.clone());
            return Directive {
                action_type: ActionType::Execute,
                tool: Some(tool),
                target_action: diagnosis.recommended_action.clone(),
            };
        }

        if diagnosis.risk_level == RiskLevel::High {
            Directive {
                action_type: ActionType::Escalate,
                tool: None,
                target_action: diagnosis.recommended_action.clone(),
            }
        } else {
            Directive {
                action_type: ActionType::Wait,
                tool: None,
                target_action: WAIT_ACTION.to_string(),
            }
        }
    }
}

impl Default for DecisionGate {
    fn default() -> Self {
        Self { threshold: 0.7 }
    }
}
