//! Append-only audit log of produced diagnoses.
//!
//! Entries are kept in production order and never edited or removed. When
//! opened on a file, every entry is appended as one JSON line and flushed
//! before `append` returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Confidence, Diagnosis, RiskLevel, SubjectId};

/// One audited diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub root_cause: String,
    pub confidence: Confidence,
    pub risk_level: RiskLevel,
    pub fingerprint: String,
    #[serde(default)]
    pub affected_subject_ids: BTreeSet<SubjectId>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn from_diagnosis(diagnosis: &Diagnosis, timestamp: DateTime<Utc>) -> Self {
        Self {
            root_cause: diagnosis.root_cause.clone(),
            confidence: diagnosis.confidence,
            risk_level: diagnosis.risk_level,
            fingerprint: diagnosis.fingerprint(),
            affected_subject_ids: diagnosis.affected_subject_ids.clone(),
            timestamp,
        }
    }
}

struct AuditInner {
    entries: Vec<AuditEntry>,
    file: Option<File>,
}

pub struct AuditLog {
    inner: Mutex<AuditInner>,
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Volatile log.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(AuditInner {
                entries: Vec::new(),
                file: None,
            }),
            path: None,
        }
    }

    /// Open a JSON-lines log, loading existing entries.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let entries = if path.exists() {
            Self::read_entries(&path)?
        } else {
            Vec::new()
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            inner: Mutex::new(AuditInner {
                entries,
                file: Some(file),
            }),
            path: Some(path),
        })
    }

    fn read_entries(path: &Path) -> Result<Vec<AuditEntry>> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                Error::MemoryCorrupt(format!("{}:{}: {}", path.display(), line_no + 1, e))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Append an entry.
    pub fn append(&self, entry: AuditEntry) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::LockPoisoned)?;

        if let Some(file) = inner.file.as_mut() {
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }

        info!(
            root_cause = %entry.root_cause,
            confidence = %entry.confidence,
            risk = %entry.risk_level,
            "Diagnosis audited"
        );
        inner.entries.push(entry);
        Ok(())
    }

    /// Ordered copy of every entry.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let inner = self.inner.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(inner.entries.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::test_support::diagnosis_for;
    use chrono::Duration;

    #[test]
    fn test_entries_keep_production_order() {
        let log = AuditLog::in_memory();
        let now = Utc::now();
        let first = diagnosis_for("migration_misconfiguration", &["a"]);
        let second = diagnosis_for("credential_rotation", &["b"]);

        log.append(AuditEntry::from_diagnosis(&first, now)).unwrap();
        log.append(AuditEntry::from_diagnosis(&second, now + Duration::seconds(1)))
            .unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].root_cause, "migration_misconfiguration");
        assert_eq!(entries[1].root_cause, "credential_rotation");
        assert_eq!(entries[0].fingerprint, first.fingerprint());
    }

    #[test]
    fn test_file_log_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let d = diagnosis_for("migration_misconfiguration", &["a", "b"]);

        {
            let log = AuditLog::open(&path).unwrap();
            log.append(AuditEntry::from_diagnosis(&d, Utc::now())).unwrap();
            log.append(AuditEntry::from_diagnosis(&d, Utc::now())).unwrap();
        }

        let reopened = AuditLog::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        reopened.append(AuditEntry::from_diagnosis(&d, Utc::now())).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_malformed_line_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        match AuditLog::open(&path) {
            Err(e) => assert!(e.is_corrupt()),
            Ok(_) => panic!("expected corrupt audit log"),
        }
    }
}
