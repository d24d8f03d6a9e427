//! Shared types for triage-core.
//!
//! Events flow in from the source, diagnoses flow out of the engine. Both are
//! immutable once constructed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};

/// Stable identifier of the entity a ticket pertains to (e.g. a merchant).
pub type SubjectId = String;

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SupportTicket,
    PlatformError,
    /// Any type the observer does not partition.
    Other,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SupportTicket => "support_ticket",
            EventKind::PlatformError => "platform_error",
            EventKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "support_ticket" | "ticket" => EventKind::SupportTicket,
            "platform_error" | "error" => EventKind::PlatformError,
            _ => EventKind::Other,
        }
    }
}

/// Immutable record produced by the event source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    /// Present on support tickets.
    pub subject_id: Option<SubjectId>,
    /// Present on platform errors.
    pub count: Option<u64>,
    /// Raw event object as received.
    pub payload: Value,
}

/// Typed fields pulled out of a raw event object.
#[derive(Deserialize)]
struct EventFields {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, alias = "merchant_id")]
    subject_id: Option<SubjectId>,
    #[serde(default)]
    count: Option<u64>,
}

impl Event {
    /// Parse a raw event object, keeping the object itself as payload.
    ///
    /// Platform errors without a count weigh 1. Support tickets must carry a
    /// subject id under `subject_id` or `merchant_id`.
    pub fn from_value(value: Value) -> Result<Self> {
        let fields: EventFields = serde_json::from_value(value.clone())?;
        let kind = EventKind::parse(&fields.kind);

        match kind {
            EventKind::SupportTicket => {
                let subject_id = fields
                    .subject_id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        Error::Serialization("support_ticket without a subject id".into())
                    })?;
                Ok(Self {
                    kind,
                    subject_id: Some(subject_id),
                    count: None,
                    payload: value,
                })
            }
            EventKind::PlatformError => Ok(Self {
                kind,
                subject_id: None,
                count: Some(fields.count.unwrap_or(1)),
                payload: value,
            }),
            EventKind::Other => Ok(Self {
                kind,
                subject_id: fields.subject_id,
                count: fields.count,
                payload: value,
            }),
        }
    }

    /// Build a support ticket for `subject_id`.
    pub fn ticket(subject_id: impl Into<SubjectId>) -> Self {
        let subject_id = subject_id.into();
        Self {
            kind: EventKind::SupportTicket,
            payload: serde_json::json!({ "type": "support_ticket", "subject_id": subject_id }),
            subject_id: Some(subject_id),
            count: None,
        }
    }

    /// Build a platform error carrying `count` occurrences.
    pub fn platform_error(count: u64) -> Self {
        Self {
            kind: EventKind::PlatformError,
            subject_id: None,
            count: Some(count),
            payload: serde_json::json!({ "type": "platform_error", "count": count }),
        }
    }

    /// Occurrences this event contributes to error volume.
    pub fn error_count(&self) -> u64 {
        match self.kind {
            EventKind::PlatformError => self.count.unwrap_or(0),
            _ => 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Confidence & Risk
// ─────────────────────────────────────────────────────────────────────────────

/// Confidence score, always finite and within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidConfidence(value))
        }
    }

    /// Clamp into range instead of failing; NaN becomes 0.
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whole percent, for display.
    pub fn percent(&self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl TryFrom<f64> for Confidence {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnosis
// ─────────────────────────────────────────────────────────────────────────────

/// Output of one triage cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub hypothesis: String,
    pub confidence: Confidence,
    pub root_cause: String,
    pub recommended_action: String,
    /// Remediation tool the rule suggests, if any.
    #[serde(default)]
    pub tool: Option<String>,
    /// Ordered reasoning clauses.
    pub reasoning: Vec<String>,
    pub risk_level: RiskLevel,
    /// Subjects this diagnosis is about. Approval and rejection touch only these.
    #[serde(default)]
    pub affected_subject_ids: BTreeSet<SubjectId>,
}

impl Diagnosis {
    /// Stable digest of what this diagnosis claims and about whom.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.root_cause.as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{:.4}", self.confidence.value()).as_bytes());
        for id in &self.affected_subject_ids {
            hasher.update(b"|");
            hasher.update(id.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Short form of the fingerprint for logs and tables.
    pub fn short_fingerprint(&self) -> String {
        self.fingerprint()[..12].to_string()
    }
}
