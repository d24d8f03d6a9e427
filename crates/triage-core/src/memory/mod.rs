//! Durable subject memory - the single source of truth for "already handled".
//!
//! Every subject the pipeline has proposed, resolved or rejected has exactly
//! one status record here. The orchestration loop filters against it and the
//! diagnosis engine reads it for context.
//!
//! ## Lifecycle
//!
//! ```text
//! (absent) ──propose──▶ PendingApproval ──approve──▶ Resolved   (terminal)
//!                              │
//!                              └──────reject──────▶ Rejected   (eligible again)
//! ```
//!
//! `Resolved` is terminal: stores never move a resolved subject to another
//! status, whatever the caller asks for.

mod file;
#[cfg(feature = "db")]
mod sqlite;
mod traits;
mod volatile;

pub use file::JsonFileStore;
#[cfg(feature = "db")]
pub use sqlite::SqliteStore;
pub use traits::MemoryStore;
pub use volatile::InMemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::types::{Diagnosis, SubjectId};

/// Status of a subject in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStatus {
    Pending,
    PendingApproval,
    Resolved,
    Rejected,
}

impl SubjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStatus::Pending => "pending",
            SubjectStatus::PendingApproval => "pending_approval",
            SubjectStatus::Resolved => "resolved",
            SubjectStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubjectStatus::Pending),
            "pending_approval" => Some(SubjectStatus::PendingApproval),
            "resolved" => Some(SubjectStatus::Resolved),
            "rejected" => Some(SubjectStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subject's memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: SubjectStatus,
    pub last_diagnosis: Diagnosis,
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time copy of the whole memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemorySnapshot {
    subjects: BTreeMap<SubjectId, StatusRecord>,
}

/// Subjects awaiting approval under the same diagnosis.
#[derive(Debug, Clone)]
pub struct PendingReview {
    pub diagnosis: Diagnosis,
    pub subjects: BTreeSet<SubjectId>,
    pub updated_at: DateTime<Utc>,
}

impl MemorySnapshot {
    pub fn new(subjects: BTreeMap<SubjectId, StatusRecord>) -> Self {
        Self { subjects }
    }

    pub fn get(&self, subject_id: &str) -> Option<&StatusRecord> {
        self.subjects.get(subject_id)
    }

    pub fn status_of(&self, subject_id: &str) -> Option<SubjectStatus> {
        self.subjects.get(subject_id).map(|r| r.status)
    }

    pub fn is_resolved(&self, subject_id: &str) -> bool {
        self.status_of(subject_id) == Some(SubjectStatus::Resolved)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubjectId, &StatusRecord)> {
        self.subjects.iter()
    }

    pub fn into_inner(self) -> BTreeMap<SubjectId, StatusRecord> {
        self.subjects
    }

    /// Pending-approval records grouped by diagnosis, newest first.
    pub fn pending_approval(&self) -> Vec<PendingReview> {
        let mut groups: BTreeMap<String, PendingReview> = BTreeMap::new();

        for (id, record) in &self.subjects {
            if record.status != SubjectStatus::PendingApproval {
                continue;
            }
            let group = groups
                .entry(record.last_diagnosis.fingerprint())
                .or_insert_with(|| PendingReview {
                    diagnosis: record.last_diagnosis.clone(),
                    subjects: BTreeSet::new(),
                    updated_at: record.updated_at,
                });
            group.subjects.insert(id.clone());
            if record.updated_at > group.updated_at {
                group.updated_at = record.updated_at;
            }
        }

        let mut pending: Vec<PendingReview> = groups.into_values().collect();
        pending.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        pending
    }
}

/// Apply one update to a record map, honouring the terminal `Resolved` status.
///
/// Returns the number of records written.
pub(crate) fn apply_update(
    subjects: &mut BTreeMap<SubjectId, StatusRecord>,
    subject_ids: &BTreeSet<SubjectId>,
    diagnosis: &Diagnosis,
    status: SubjectStatus,
    now: DateTime<Utc>,
) -> usize {
    let mut written = 0;
    for id in subject_ids {
        if let Some(existing) = subjects.get(id) {
            if existing.status == SubjectStatus::Resolved && status != SubjectStatus::Resolved {
                debug!(subject_id = %id, requested = %status, "Keeping resolved subject");
                continue;
            }
        }
        subjects.insert(
            id.clone(),
            StatusRecord {
                status,
                last_diagnosis: diagnosis.clone(),
                updated_at: now,
            },
        );
        written += 1;
    }
    written
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{Confidence, Diagnosis, RiskLevel};

    /// Diagnosis about `subjects` with the given root cause.
    pub fn diagnosis_for(root_cause: &str, subjects: &[&str]) -> Diagnosis {
        Diagnosis {
            hypothesis: format!("{} hypothesis", root_cause),
            confidence: Confidence::new(0.8).unwrap(),
            root_cause: root_cause.to_string(),
            recommended_action: "Alert merchants to update API keys".into(),
            tool: Some("notify_subjects".into()),
            reasoning: vec!["test clause".into()],
            risk_level: RiskLevel::Medium,
            affected_subject_ids: subjects.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::diagnosis_for;
    use super::*;
    use chrono::Duration;

    fn ids(list: &[&str]) -> BTreeSet<SubjectId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_apply_update_touches_only_listed_ids() {
        let mut subjects = BTreeMap::new();
        let now = Utc::now();
        let d = diagnosis_for("migration_misconfiguration", &["a", "b"]);

        apply_update(&mut subjects, &ids(&["a", "b", "c"]), &d, SubjectStatus::PendingApproval, now);
        apply_update(&mut subjects, &ids(&["a"]), &d, SubjectStatus::Rejected, now);

        assert_eq!(subjects["a"].status, SubjectStatus::Rejected);
        assert_eq!(subjects["b"].status, SubjectStatus::PendingApproval);
        assert_eq!(subjects["c"].status, SubjectStatus::PendingApproval);
    }

    #[test]
    fn test_resolved_is_terminal() {
        let mut subjects = BTreeMap::new();
        let now = Utc::now();
        let d = diagnosis_for("migration_misconfiguration", &["a"]);

        apply_update(&mut subjects, &ids(&["a"]), &d, SubjectStatus::Resolved, now);
        let written = apply_update(&mut subjects, &ids(&["a"]), &d, SubjectStatus::Rejected, now);

        assert_eq!(written, 0);
        assert_eq!(subjects["a"].status, SubjectStatus::Resolved);
    }

    #[test]
    fn test_pending_groups_newest_first() {
        let mut subjects = BTreeMap::new();
        let older = Utc::now() - Duration::minutes(5);
        let newer = Utc::now();
        let first = diagnosis_for("migration_misconfiguration", &["a", "b"]);
        let second = diagnosis_for("credential_rotation", &["c"]);

        apply_update(&mut subjects, &ids(&["a", "b"]), &first, SubjectStatus::PendingApproval, older);
        apply_update(&mut subjects, &ids(&["c"]), &second, SubjectStatus::PendingApproval, newer);
        apply_update(&mut subjects, &ids(&["d"]), &second, SubjectStatus::Rejected, newer);

        let snapshot = MemorySnapshot::new(subjects);
        let pending = snapshot.pending_approval();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].diagnosis.root_cause, "credential_rotation");
        assert_eq!(pending[0].subjects, ids(&["c"]));
        assert_eq!(pending[1].subjects, ids(&["a", "b"]));
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [
            SubjectStatus::Pending,
            SubjectStatus::PendingApproval,
            SubjectStatus::Resolved,
            SubjectStatus::Rejected,
        ] {
            assert_eq!(SubjectStatus::from_str(status.as_str()), Some(status));
        }
    }
}
