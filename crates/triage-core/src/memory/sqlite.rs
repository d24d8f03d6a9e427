//! SQLite-backed memory store.
//!
//! Each `update` runs inside one immediate transaction, so processes sharing
//! a database file get read-modify-write atomicity per call.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::{MemorySnapshot, MemoryStore, StatusRecord, SubjectStatus};
use crate::error::{Error, Result};
use crate::types::{Diagnosis, SubjectId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS subject_status (
    subject_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    last_diagnosis_json TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All operations acquire the lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteStore {
    /// Open (and migrate) a database file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::Database)?;
        Self::with_connection(conn, path.display().to_string())
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        Self::with_connection(conn, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, location: String) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.execute_batch("SELECT 1").map_err(Error::Database)
    }

    fn map_record(
        subject_id: String,
        status: String,
        diagnosis_json: String,
        updated_at: i64,
    ) -> Result<StatusRecord> {
        let status = SubjectStatus::from_str(&status).ok_or_else(|| {
            Error::MemoryCorrupt(format!("subject {}: unknown status {}", subject_id, status))
        })?;
        let last_diagnosis: Diagnosis = serde_json::from_str(&diagnosis_json).map_err(|e| {
            Error::MemoryCorrupt(format!("subject {}: {}", subject_id, e))
        })?;
        let updated_at = DateTime::<Utc>::from_timestamp_millis(updated_at).ok_or_else(|| {
            Error::MemoryCorrupt(format!("subject {}: invalid timestamp", subject_id))
        })?;

        Ok(StatusRecord {
            status,
            last_diagnosis,
            updated_at,
        })
    }
}

impl MemoryStore for SqliteStore {
    fn load(&self) -> Result<MemorySnapshot> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT subject_id, status, last_diagnosis_json, updated_at
             FROM subject_status ORDER BY subject_id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut subjects = BTreeMap::new();
        for (subject_id, status, diagnosis_json, updated_at) in rows {
            let record = Self::map_record(subject_id.clone(), status, diagnosis_json, updated_at)?;
            subjects.insert(subject_id, record);
        }
        Ok(MemorySnapshot::new(subjects))
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

        let diagnosis_json = serde_json::to_string(diagnosis)?;
        let now = Utc::now().timestamp_millis();

        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut written = 0usize;

        for id in subject_ids {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT status FROM subject_status WHERE subject_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.as_deref() == Some(SubjectStatus::Resolved.as_str())
                && status != SubjectStatus::Resolved
            {
                debug!(subject_id = %id, requested = %status, "Keeping resolved subject");
                continue;
            }

            tx.execute(
                "INSERT INTO subject_status (subject_id, status, last_diagnosis_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(subject_id) DO UPDATE SET
                    status = excluded.status,
                    last_diagnosis_json = excluded.last_diagnosis_json,
                    updated_at = excluded.updated_at",
                params![id, status.as_str(), &diagnosis_json, now],
            )?;
            written += 1;
        }

        tx.commit()?;
        debug!(status = %status, written = written, "Memory updated");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.location)
    }
}
