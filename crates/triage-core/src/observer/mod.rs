//! Event observation - snapshot the event source and partition by type.
//!
//! The observer is stateless: every call reads a fresh snapshot and splits
//! it into tickets and platform errors. Filtering against memory happens in
//! the orchestration loop, never here.

mod sources;

pub use sources::*;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::types::{Event, EventKind, SubjectId};

/// Anything that can be polled for a snapshot of events.
///
/// Implementations report an unreadable source as `Error::SourceUnavailable`.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch the current, ordered snapshot of events.
    async fn fetch_events(&self) -> Result<Vec<Event>>;

    /// Human-readable location, for logs and diagnostics.
    fn describe(&self) -> String;
}

/// Events of one snapshot, partitioned by type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Observation {
    pub tickets: Vec<Event>,
    pub errors: Vec<Event>,
}

impl Observation {
    /// Sum of platform error counts.
    pub fn error_volume(&self) -> u64 {
        self.errors
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.error_count()))
    }

    /// Distinct subjects referenced by tickets.
    pub fn subjects(&self) -> BTreeSet<SubjectId> {
        self.tickets
            .iter()
            .filter_map(|t| t.subject_id.clone())
            .collect()
    }
}

/// Stateless partitioning wrapper around an event source.
#[derive(Clone)]
pub struct Observer {
    source: Arc<dyn EventSource>,
}

impl Observer {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }

    /// Snapshot the source and partition by event type.
    pub async fn observe(&self) -> Result<Observation> {
        let events = self.source.fetch_events().await?;
        let mut observation = Observation::default();
        let mut ignored = 0usize;

        for event in events {
            match event.kind {
                EventKind::SupportTicket => observation.tickets.push(event),
                EventKind::PlatformError => observation.errors.push(event),
                EventKind::Other => ignored += 1,
            }
        }

        debug!(
            source = %self.source.describe(),
            tickets = observation.tickets.len(),
            errors = observation.errors.len(),
            ignored = ignored,
            "Observed events"
        );

        Ok(observation)
    }

    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }
}
