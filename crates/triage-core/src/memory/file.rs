//! JSON document memory store.
//!
//! The whole memory is one document, rewritten on every update through a
//! temporary file in the same directory and renamed over the old one, so a
//! crash mid-write leaves the previous document intact.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::{apply_update, MemorySnapshot, MemoryStore, StatusRecord, SubjectStatus};
use crate::error::{Error, Result};
use crate::types::{Diagnosis, SubjectId};

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct MemoryDocument {
    version: u32,
    #[serde(default)]
    subjects: BTreeMap<SubjectId, StatusRecord>,
}

/// File-backed store holding memory as a single JSON document.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serialises read-modify-write within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<BTreeMap<SubjectId, StatusRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let document: MemoryDocument = serde_json::from_str(&content).map_err(|e| {
            Error::MemoryCorrupt(format!("{}: {}", self.path.display(), e))
        })?;

        if document.version != DOCUMENT_VERSION {
            return Err(Error::MemoryCorrupt(format!(
                "{}: unsupported document version {}",
                self.path.display(),
                document.version
            )));
        }

        Ok(document.subjects)
    }

    fn write_document(&self, subjects: BTreeMap<SubjectId, StatusRecord>) -> Result<()> {
        let document = MemoryDocument {
            version: DOCUMENT_VERSION,
            subjects,
        };
        let content = serde_json::to_vec_pretty(&document)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl MemoryStore for JsonFileStore {
    fn load(&self) -> Result<MemorySnapshot> {
        Ok(MemorySnapshot::new(self.read_document()?))
    }

    fn update(
        &self,
        subject_ids: &BTreeSet<SubjectId>,
        diagnosis: &Diagnosis,
        status: SubjectStatus,
    ) -> Result<()> {
        if subject_ids.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().map_err(|_| Error::LockPoisoned)?;
        let mut subjects = self.read_document()?;
        let written = apply_update(&mut subjects, subject_ids, diagnosis, status, Utc::now());
        if written > 0 {
            self.write_document(subjects)?;
        }

        debug!(
            path = %self.path.display(),
            status = %status,
            written = written,
            "Memory updated"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}
