//! Volatile memory store for tests and dry runs.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{apply_update, MemorySnapshot, MemoryStore, StatusRecord, SubjectStatus};
use crate::error::{Error, Result};
use crate::types::{Diagnosis, SubjectId};

/// Memory that lives only as long as the process.
#[derive(Default)]
pub struct InMemoryStore {
    subjects: Mutex<BTreeMap<SubjectId, StatusRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subjects with a record.
    pub fn len(&self) -> usize {
        self.subjects.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MemoryStore for InMemoryStore {
    fn load(&self) -> Result<MemorySnapshot> {
        let subjects = self.subjects.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(MemorySnapshot::new(subjects.clone()))
    }

    fn update(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        diagnosis: &Diagnosis,
        status: SubjectStatus,
    ) -> Result<()> {
        let mut subjects = self.subjects.lock().map_err(|_| Error::LockPoisoned)?;
        apply_update(&mut subjects, subject_ids, diagnosis, status, Utc::now());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
