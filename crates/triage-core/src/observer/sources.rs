//! Event source adapters.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::warn;

use super::EventSource;
use crate::error::{Error, Result};
use crate::types::Event;

/// Parse a raw snapshot into events.
///
/// Accepts a top-level array or an object with an `events` array. Malformed
/// individual events are skipped; a malformed snapshot is a source failure.
pub fn parse_events(value: Value) -> Result<Vec<Event>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::SourceUnavailable(
                    "snapshot object has no `events` array".into(),
                ));
            }
        },
        _ => {
            return Err(Error::SourceUnavailable(
                "snapshot is not a JSON array".into(),
            ));
        }
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match Event::from_value(item) {
            Ok(event) => events.push(event),
            Err(e) => warn!(index = index, error = %e, "Skipping malformed event"),
        }
    }
    Ok(events)
}

// ─────────────────────────────────────────────────────────────────────────────
// Document Source
// ─────────────────────────────────────────────────────────────────────────────

/// JSON document re-read on every fetch.
pub struct DocumentSource {
    path: PathBuf,
    timeout: Duration,
}

impl DocumentSource {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl EventSource for DocumentSource {
    async fn fetch_events(&self) -> Result<Vec<Event>> {
        let read = tokio::time::timeout(self.timeout, tokio::fs::read_to_string(&self.path));
        let content = match read.await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                return Err(Error::SourceUnavailable(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )));
            }
            Err(_) => {
                return Err(Error::SourceUnavailable(format!(
                    "{}: read timed out after {}s",
                    self.path.display(),
                    self.timeout.as_secs()
                )));
            }
        };

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            Error::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        parse_events(value)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Source
// ─────────────────────────────────────────────────────────────────────────────

/// Endpoint returning a JSON snapshot on GET.
#[cfg(feature = "client")]
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

#[cfg(feature = "client")]
impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[cfg(feature = "client")]
#[async_trait]
impl EventSource for HttpSource {
    async fn fetch_events(&self) -> Result<Vec<Event>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("{}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SourceUnavailable(format!(
                "{}: HTTP {}",
                self.url, status
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("{}: {}", self.url, e)))?;
        parse_events(value)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Static Source
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory snapshot that can be swapped between fetches.
#[derive(Default)]
pub struct StaticSource {
    events: RwLock<Vec<Event>>,
    unavailable: AtomicBool,
}

impl StaticSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: RwLock::new(events),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Replace the snapshot returned by subsequent fetches.
    pub fn replace(&self, events: Vec<Event>) {
        if let Ok(mut guard) = self.events.write() {
            *guard = events;
        }
    }

    /// Simulate an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventSource for StaticSource {
    async fn fetch_events(&self) -> Result<Vec<Event>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::SourceUnavailable("static source offline".into()));
        }
        let events = self.events.read().map_err(|_| Error::LockPoisoned)?;
        Ok(events.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use serde_json::json;

    #[test]
    fn test_parse_skips_malformed_events() {
        let events = parse_events(json!([
            { "type": "support_ticket", "merchant_id": "m-1" },
            { "type": "support_ticket" },
            { "kind": "no type field" },
            { "type": "platform_error", "count": 4 }
        ]))
        .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::SupportTicket);
        assert_eq!(events[1].error_count(), 4);
    }

    #[test]
    fn test_parse_events_wrapper_object() {
        let events = parse_events(json!({
            "events": [{ "type": "platform_error", "count": 2 }]
        }))
        .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_parse_rejects_scalar_snapshot() {
        let err = parse_events(json!("nope")).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_document_source_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(
            &path,
            r#"[{"type":"support_ticket","merchant_id":"m-7"},{"type":"platform_error","count":5}]"#,
        )
        .unwrap();

        let source = DocumentSource::new(&path, Duration::from_secs(1));
        let events = source.fetch_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].subject_id.as_deref(), Some("m-7"));
    }

    #[tokio::test]
    async fn test_document_source_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = DocumentSource::new(dir.path().join("absent.json"), Duration::from_secs(1));
        let err = source.fetch_events().await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_document_source_invalid_json_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let source = DocumentSource::new(&path, Duration::from_secs(1));
        assert!(source.fetch_events().await.is_err());
    }

    #[tokio::test]
    async fn test_static_source_replace() {
        let source = StaticSource::new(vec![Event::ticket("a")]);
        source.replace(vec![Event::ticket("a"), Event::ticket("b")]);
        assert_eq!(source.fetch_events().await.unwrap().len(), 2);
    }
}
