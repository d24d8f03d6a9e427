//! Built-in remediation tools.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
#[cfg(feature = "client")]
use std::time::Duration;
use tracing::info;
#[cfg(feature = "client")]
use tracing::warn;

use super::RemediationTool;
use crate::error::{Error, Result};
use crate::types::{Diagnosis, SubjectId};

pub const NOTIFY_SUBJECTS: &str = "notify_subjects";

/// Notices kept in the outbox before the oldest are dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// A notice sent to one subject.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub subject_id: SubjectId,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Notifies every affected subject of the recommended action.
///
/// Notices are logged and the most recent ones kept in a bounded outbox.
pub struct NotifySubjectsTool {
    outbox: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl NotifySubjectsTool {
    pub fn new() -> Self {
        Self::with_capacity(OUTBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outbox: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Most recent notices, oldest first.
    pub fn sent(&self) -> Result<Vec<Notification>> {
        let outbox = self.outbox.lock().map_err(|_| Error::LockPoisoned)?;
        Ok(outbox.iter().cloned().collect())
    }
}

impl Default for NotifySubjectsTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemediationTool for NotifySubjectsTool {
    fn name(&self) -> &str {
        NOTIFY_SUBJECTS
    }

    async fn invoke(&self, diagnosis: &Diagnosis) -> Result<Value> {
        if diagnosis.affected_subject_ids.is_empty() {
            return Err(Error::action_failed(NOTIFY_SUBJECTS, "no subjects to notify"));
        }

        let now = Utc::now();
        let mut outbox = self.outbox.lock().map_err(|_| Error::LockPoisoned)?;
        for id in &diagnosis.affected_subject_ids {
            info!(subject_id = %id, action = %diagnosis.recommended_action, "Notifying subject");
            if outbox.len() == self.capacity {
                outbox.pop_front();
            }
            outbox.push_back(Notification {
                subject_id: id.clone(),
                message: diagnosis.recommended_action.clone(),
                sent_at: now,
            });
        }

        Ok(json!({
            "notified": diagnosis.affected_subject_ids,
            "message": diagnosis.recommended_action,
        }))
    }
}

/// Forwards the diagnosis to an HTTP endpoint.
#[cfg(feature = "client")]
pub struct WebhookTool {
    name: String,
    url: String,
    client: reqwest::Client,
}

#[cfg(feature = "client")]
impl WebhookTool {
    pub fn new(name: String, url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("webhook {}: {}", name, e)))?;
        Ok(Self { name, url, client })
    }
}

#[cfg(feature = "client")]
#[async_trait]
impl RemediationTool for WebhookTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, diagnosis: &Diagnosis) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "tool": self.name,
                "fingerprint": diagnosis.fingerprint(),
                "diagnosis": diagnosis,
            }))
            .send()
            .await
            .map_err(|e| Error::action_failed(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::action_failed(
                &self.name,
                format!("{} returned {}", self.url, status),
            ));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Failed to read webhook response body");
                String::new()
            }
        };
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({ "status": status.as_u16() })))
    }
}
