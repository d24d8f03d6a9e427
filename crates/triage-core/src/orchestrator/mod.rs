//! Orchestration - the edge-triggered polling loop and the wiring that
//! assembles it from configuration.

mod triage_loop;

pub use triage_loop::{CycleReport, TriageLoop};

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::approval::ReviewDesk;
use crate::audit::AuditLog;
use crate::config::{SourceConfig, SourceKind, StorageBackend, StorageConfig, TriageConfig};
use crate::decision::DecisionGate;
use crate::diagnosis::DiagnosisEngine;
use crate::error::{Error, Result};
use crate::executor::ActionExecutor;
use crate::memory::{JsonFileStore, MemoryStore};
use crate::observer::{DocumentSource, EventSource, Observer};

/// Build the configured event source.
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn EventSource>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.kind {
        SourceKind::Document => Ok(Arc::new(DocumentSource::new(config.path.clone(), timeout))),
        #[cfg(feature = "client")]
        SourceKind::Http => {
            let url = config
                .url
                .clone()
                .ok_or_else(|| Error::Config("source.url is required for http sources".into()))?;
            Ok(Arc::new(crate::observer::HttpSource::new(url, timeout)?))
        }
        #[cfg(not(feature = "client"))]
        SourceKind::Http => Err(Error::Config(
            "http sources need the `client` feature".into(),
        )),
    }
}

/// Open the configured memory store.
pub fn open_memory(config: &StorageConfig) -> Result<Arc<dyn MemoryStore>> {
    match config.backend {
        StorageBackend::Json => Ok(Arc::new(JsonFileStore::open(config.memory_path.clone())?)),
        #[cfg(feature = "db")]
        StorageBackend::Sqlite => Ok(Arc::new(crate::memory::SqliteStore::open(
            &config.memory_path,
        )?)),
        #[cfg(not(feature = "db"))]
        StorageBackend::Sqlite => Err(Error::Config(
            "the sqlite backend needs the `db` feature".into(),
        )),
    }
}

/// Every long-lived component, wired from one configuration.
pub struct Pipeline {
    pub config: TriageConfig,
    pub source: Arc<dyn EventSource>,
    pub memory: Arc<dyn MemoryStore>,
    pub audit: Arc<AuditLog>,
    pub executor: Arc<ActionExecutor>,
    pub gate: DecisionGate,
    pub desk: Arc<ReviewDesk>,
}

impl Pipeline {
    pub fn from_config(config: TriageConfig) -> Result<Self> {
        config.validate()?;
        config.ensure_dirs()?;

        let source = build_source(&config.source)?;
        let memory = open_memory(&config.storage)?;
        let audit = Arc::new(AuditLog::open(config.storage.audit_path.clone())?);
        let executor = Arc::new(ActionExecutor::from_config(&config)?);
        let gate = DecisionGate::new(config.decision.escalation_threshold)?;
        let desk = Arc::new(ReviewDesk::new(executor.clone(), memory.clone(), gate));

        info!(
            source = %source.describe(),
            memory = %memory.describe(),
            tools = ?executor.tool_names(),
            "Pipeline assembled"
        );

        Ok(Self {
            config,
            source,
            memory,
            audit,
            executor,
            gate,
            desk,
        })
    }

    /// A fresh loop over the shared components, feeding the review desk.
    pub fn triage_loop(&self) -> Result<TriageLoop> {
        let engine = DiagnosisEngine::from_config(&self.config)?;
        Ok(TriageLoop::new(
            Observer::new(self.source.clone()),
            engine,
            self.gate,
            self.memory.clone(),
            self.audit.clone(),
        )
        .with_policy(self.config.monitoring.baseline_policy)
        .with_interval(Duration::from_secs(self.config.monitoring.interval_secs))
        .with_review_desk(self.desk.clone()))
    }
}
