//! Memory store trait defining the interface for status persistence.

use std::collections::BTreeSet;

use super::{MemorySnapshot, SubjectStatus};
use crate::error::Result;
use crate::types::{Diagnosis, SubjectId};

/// Core trait for subject memory.
///
/// Implementations handle the actual storage backend (JSON document, SQLite,
/// in-memory). Unreadable persisted state must surface as
/// `Error::MemoryCorrupt`, never as an empty snapshot.
pub trait MemoryStore: Send + Sync {
    /// Load the current durable state. Safe to call repeatedly.
    fn load(&self) -> Result<MemorySnapshot>;

    /// Upsert a status record for each listed subject.
    ///
    /// Subjects outside `subject_ids` are untouched. The call is atomic:
    /// either every listed subject is written or none is.
    fn update(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        diagnosis: &Diagnosis,
        status: SubjectStatus,
    ) -> Result<()>;

    /// Human-readable location, for logs and diagnostics.
    fn describe(&self) -> String;
}
