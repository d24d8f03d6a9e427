//! MonitoringService - background triage loop
//!
//! Runs one `TriageLoop` in a spawned task. The loop feeds the review desk,
//! so pending diagnoses surface on `GET /api/review` without a manual scan.
//! `POST /api/scan` wakes the running loop, or runs a single cycle inline
//! when monitoring is stopped. Inline scans share one loop, initialized on
//! the first scan, so a volume rise between scans still fires.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

use triage_core::{CycleReport, Pipeline, Result, TriageLoop};

/// Handle for the running monitoring task
struct MonitoringHandle {
    abort_handle: tokio::task::AbortHandle,
    interval_secs: u64,
    started_at: DateTime<Utc>,
}

/// What the last cycles produced
#[derive(Default)]
struct MonitoringRecord {
    cycles: u64,
    last_report: Option<CycleReport>,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStatus {
    pub active: bool,
    pub interval_secs: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
}

/// Outcome of a scan request
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    /// The running loop was woken; its report arrives via status.
    pub triggered: bool,
    /// Report of the inline cycle when monitoring is stopped.
    pub report: Option<CycleReport>,
}

pub struct MonitoringService {
    pipeline: Arc<Pipeline>,
    trigger: Arc<Notify>,
    handle: Mutex<Option<MonitoringHandle>>,
    record: Arc<RwLock<MonitoringRecord>>,
    /// Loop used for scans while monitoring is stopped.
    inline: Mutex<Option<TriageLoop>>,
}

impl MonitoringService {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            trigger: Arc::new(Notify::new()),
            handle: Mutex::new(None),
            record: Arc::new(RwLock::new(MonitoringRecord::default())),
            inline: Mutex::new(None),
        }
    }

    /// Start the loop, replacing any running one.
    pub async fn start(&self, interval_secs: Option<u64>) -> Result<MonitoringStatus> {
        let mut handle = self.handle.lock().await;
        if let Some(existing) = handle.take() {
            existing.abort_handle.abort();
        }
        // The background loop takes its own baseline.
        self.inline.lock().await.take();

        let interval_secs = interval_secs
            .unwrap_or(self.pipeline.config.monitoring.interval_secs)
            .max(1);
        let mut triage = self
            .pipeline
            .triage_loop()?
            .with_interval(Duration::from_secs(interval_secs));

        info!(interval_secs, "Starting monitoring");

        let trigger = Arc::clone(&self.trigger);
        let record = Arc::clone(&self.record);
        let task = tokio::spawn(async move {
            if let Err(e) = triage.initialize().await {
                error!(error = %e, "Monitoring failed to initialize");
                set_error(&record, e.to_string());
                return;
            }

            let on_cycle = |report: &CycleReport| {
                if let Ok(mut r) = record.write() {
                    r.cycles += 1;
                    r.last_report = Some(report.clone());
                    r.last_error = None;
                }
            };

            if let Err(e) = triage
                .run(std::future::pending::<()>(), trigger, on_cycle)
                .await
            {
                error!(error = %e, "Monitoring stopped");
                set_error(&record, e.to_string());
            }
        });

        *handle = Some(MonitoringHandle {
            abort_handle: task.abort_handle(),
            interval_secs,
            started_at: Utc::now(),
        });
        drop(handle);

        Ok(self.status().await)
    }

    /// Stop the loop if running.
    pub async fn stop(&self) -> MonitoringStatus {
        if let Some(existing) = self.handle.lock().await.take() {
            existing.abort_handle.abort();
            info!("Stopped monitoring");
        }
        self.status().await
    }

    pub async fn is_active(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.abort_handle.is_finished())
    }

    pub async fn status(&self) -> MonitoringStatus {
        let handle = self.handle.lock().await;
        let running = handle.as_ref().filter(|h| !h.abort_handle.is_finished());

        let (cycles, last_report, last_error) = match self.record.read() {
            Ok(r) => (r.cycles, r.last_report.clone(), r.last_error.clone()),
            Err(_) => (0, None, Some("monitoring record lock poisoned".to_string())),
        };

        MonitoringStatus {
            active: running.is_some(),
            interval_secs: running.map(|h| h.interval_secs),
            started_at: running.map(|h| h.started_at),
            cycles,
            last_report,
            last_error,
        }
    }

    /// Run a cycle now.
    pub async fn scan(&self) -> Result<ScanOutcome> {
        if self.is_active().await {
            self.trigger.notify_one();
            return Ok(ScanOutcome {
                triggered: true,
                report: None,
            });
        }

        let mut inline = self.inline.lock().await;
        let mut triage = match inline.take() {
            Some(triage) => triage,
            None => {
                let mut triage = self.pipeline.triage_loop()?;
                triage.initialize().await?;
                triage
            }
        };
        let result = triage.run_cycle().await;
        *inline = Some(triage);
        let report = result?;
        Ok(ScanOutcome {
            triggered: false,
            report: Some(report),
        })
    }
}

fn set_error(record: &RwLock<MonitoringRecord>, message: String) {
    match record.write() {
        Ok(mut r) => r.last_error = Some(message),
        Err(_) => warn!("Monitoring record lock poisoned"),
    }
}
