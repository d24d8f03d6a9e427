use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::approval::ReviewDesk;
use crate::audit::{AuditEntry, AuditLog};
use crate::config::BaselinePolicy;
use crate::decision::{DecisionGate, Directive};
use crate::diagnosis::{DiagnosisEngine, TriageContext};
use crate::error::Result;
use crate::memory::{MemorySnapshot, MemoryStore, SubjectStatus};
use crate::observer::Observer;
use crate::types::{Diagnosis, SubjectId};

/// What one cycle saw and did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub fired: bool,
    pub error_volume: u64,
    /// Baseline the volume was compared against.
    pub baseline: u64,
    pub new_subjects: BTreeSet<SubjectId>,
    pub diagnosis: Option<Diagnosis>,
    pub directive: Option<Directive>,
    pub marked_pending: BTreeSet<SubjectId>,
    pub audited: bool,
    /// Review opened on the desk after this cycle.
    pub offered: Option<Uuid>,
    pub observed_at: DateTime<Utc>,
}

/// Edge-triggered controller: reason only when something changed.
pub struct TriageLoop {
    observer: Observer,
    engine: DiagnosisEngine,
    gate: DecisionGate,
    memory: Arc<dyn MemoryStore>,
    audit: Arc<AuditLog>,
    desk: Option<Arc<ReviewDesk>>,
    policy: BaselinePolicy,
    interval: Duration,
    baseline: Option<u64>,
}

impl TriageLoop {
    pub fn new(
        observer: Observer,
        engine: DiagnosisEngine,
        gate: DecisionGate,
        memory: Arc<dyn MemoryStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            observer,
            engine,
            gate,
            memory,
            audit,
            desk: None,
            policy: BaselinePolicy::default(),
            interval: Duration::from_secs(30),
            baseline: None,
        }
    }

    pub fn with_policy(mut self, policy: BaselinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Offer pending diagnoses to `desk` after every cycle.
    pub fn with_review_desk(mut self, desk: Arc<ReviewDesk>) -> Self {
        self.desk = Some(desk);
        self
    }

    pub fn baseline(&self) -> Option<u64> {
        self.baseline
    }

    /// Record the current error volume as the baseline.
    ///
    /// Marks nothing as seen, so tickets already present still count as new.
    /// If the source is unavailable the baseline is taken on the first
    /// successful observe instead.
    pub async fn initialize(&mut self) -> Result<Option<u64>> {
        match self.observer.observe().await {
            Ok(observation) => {
                let volume = observation.error_volume();
                info!(baseline = volume, "Triage loop initialized");
                self.baseline = Some(volume);
            }
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Startup observe failed; baseline deferred");
                self.baseline = None;
            }
            Err(e) => return Err(e),
        }
        Ok(self.baseline)
    }

    /// Run one observe/filter/reason cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let observation = self.observer.observe().await?;
        let memory = self.memory.load()?;

        let volume = observation.error_volume();
        let baseline = *self.baseline.get_or_insert(volume);
        let new_subjects = new_subjects(&observation.subjects(), &memory);
        let fired = !new_subjects.is_empty() || volume > baseline;

        let mut report = CycleReport {
            fired,
            error_volume: volume,
            baseline,
            new_subjects,
            diagnosis: None,
            directive: None,
            marked_pending: BTreeSet::new(),
            audited: false,
            offered: None,
            observed_at: Utc::now(),
        };

        if !fired {
            debug!(volume, baseline, "Signals unchanged; skipping diagnosis");
            if self.policy == BaselinePolicy::EveryCycle {
                self.baseline = Some(volume);
            }
            report.offered = self.offer_pending().await?;
            return Ok(report);
        }

        info!(
            new_subjects = report.new_subjects.len(),
            volume,
            baseline,
            "New signals detected"
        );

        let context = TriageContext::from_observation(&observation, &memory);
        let diagnosis = self.engine.reason(&context, &memory);
        let directive = self.gate.decide(&diagnosis);

        info!(
            root_cause = %diagnosis.root_cause,
            confidence = %diagnosis.confidence,
            action = %directive.action_type,
            "Diagnosis produced"
        );

        if directive.is_execute() {
            let affected = &diagnosis.affected_subject_ids;
            if already_pending(affected, &diagnosis, &memory) {
                debug!(
                    fingerprint = %diagnosis.short_fingerprint(),
                    "Diagnosis already awaiting approval"
                );
            } else if !affected.is_empty() {
                self.memory
                    .update(affected, &diagnosis, SubjectStatus::PendingApproval)?;
                self.audit
                    .append(AuditEntry::from_diagnosis(&diagnosis, report.observed_at))?;
                info!(subjects = affected.len(), "Subjects marked pending approval");
                report.marked_pending = affected.clone();
                report.audited = true;
            }
        }

        self.baseline = Some(volume);
        report.diagnosis = Some(diagnosis);
        report.directive = Some(directive);
        report.offered = self.offer_pending().await?;
        Ok(report)
    }

    /// Poll until `shutdown` completes.
    ///
    /// Cycles run on every interval tick and whenever `trigger` is notified.
    /// Transient failures are logged and retried on the next cycle; anything
    /// else, corrupt memory included, stops the loop with the error.
    pub async fn run<S, F>(&mut self, shutdown: S, trigger: Arc<Notify>, mut on_cycle: F) -> Result<()>
    where
        S: Future<Output = ()>,
        F: FnMut(&CycleReport),
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "Triage loop running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Triage loop stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {}
                _ = trigger.notified() => {
                    debug!("Cycle triggered");
                }
            }

            match self.run_cycle().await {
                Ok(report) => on_cycle(&report),
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Cycle failed; retrying next interval");
                }
                Err(e) => {
                    error!(error = %e, "Triage loop stopped");
                    return Err(e);
                }
            }
        }
    }

    async fn offer_pending(&self) -> Result<Option<Uuid>> {
        match &self.desk {
            Some(desk) => desk.offer_pending().await,
            None => Ok(None),
        }
    }
}

/// Ticket subjects that are absent from memory or still awaiting a decision.
fn new_subjects(subjects: &BTreeSet<SubjectId>, memory: &MemorySnapshot) -> BTreeSet<SubjectId> {
    subjects
        .iter()
        .filter(|id| {
            matches!(
                memory.status_of(id),
                None | Some(SubjectStatus::Pending) | Some(SubjectStatus::PendingApproval)
            )
        })
        .cloned()
        .collect()
}

/// True when every affected subject already awaits approval of this same diagnosis.
fn already_pending(
    affected: &BTreeSet<SubjectId>,
    diagnosis: &Diagnosis,
    memory: &MemorySnapshot,
) -> bool {
    if affected.is_empty() {
        return false;
    }
    let fingerprint = diagnosis.fingerprint();
    affected.iter().all(|id| {
        memory.get(id).is_some_and(|record| {
            record.status == SubjectStatus::PendingApproval
                && record.last_diagnosis.fingerprint() == fingerprint
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriageConfig;
    use crate::memory::{test_support::diagnosis_for, InMemoryStore};
    use crate::observer::StaticSource;
    use crate::types::Event;

    struct Harness {
        source: Arc<StaticSource>,
        memory: Arc<InMemoryStore>,
        audit: Arc<AuditLog>,
        triage: TriageLoop,
    }

    fn harness(events: Vec<Event>, policy: BaselinePolicy) -> Harness {
        let source = Arc::new(StaticSource::new(events));
        let memory = Arc::new(InMemoryStore::new());
        let audit = Arc::new(AuditLog::in_memory());
        let config = TriageConfig::default();
        let triage = TriageLoop::new(
            Observer::new(source.clone()),
            DiagnosisEngine::from_config(&config).unwrap(),
            DecisionGate::default(),
            memory.clone(),
            audit.clone(),
        )
        .with_policy(policy);
        Harness {
            source,
            memory,
            audit,
            triage,
        }
    }

    fn migration_events() -> Vec<Event> {
        vec![
            Event::ticket("m-1"),
            Event::ticket("m-2"),
            Event::platform_error(5),
        ]
    }

    #[tokio::test]
    async fn test_new_tickets_fire_and_mark_pending() {
        let mut h = harness(migration_events(), BaselinePolicy::OnFire);
        h.triage.initialize().await.unwrap();
        assert_eq!(h.triage.baseline(), Some(5));

        let report = h.triage.run_cycle().await.unwrap();
        assert!(report.fired);
        assert!(report.directive.unwrap().is_execute());
        assert!(report.audited);
        assert_eq!(report.marked_pending.len(), 2);

        let snapshot = h.memory.load().unwrap();
        assert_eq!(snapshot.status_of("m-1"), Some(SubjectStatus::PendingApproval));
        assert_eq!(h.audit.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_reoffered_without_reaudit() {
        let mut h = harness(migration_events(), BaselinePolicy::OnFire);
        h.triage.initialize().await.unwrap();

        h.triage.run_cycle().await.unwrap();
        let second = h.triage.run_cycle().await.unwrap();

        assert!(second.fired);
        assert!(!second.audited);
        assert!(second.marked_pending.is_empty());
        assert_eq!(h.audit.len(), 1);
    }

    #[tokio::test]
    async fn test_resolved_subjects_without_volume_change_do_not_fire() {
        let mut h = harness(vec![Event::ticket("m-1"), Event::platform_error(5)], BaselinePolicy::OnFire);
        let resolved = diagnosis_for("migration_misconfiguration", &["m-1"]);
        h.memory
            .update(&["m-1".to_string()].into(), &resolved, SubjectStatus::Resolved)
            .unwrap();
        h.triage.initialize().await.unwrap();

        let report = h.triage.run_cycle().await.unwrap();
        assert!(!report.fired);
        assert!(report.diagnosis.is_none());
        assert!(h.audit.is_empty());
    }

    #[tokio::test]
    async fn test_volume_increase_fires() {
        let mut h = harness(vec![Event::platform_error(5)], BaselinePolicy::OnFire);
        h.triage.initialize().await.unwrap();
        assert!(!h.triage.run_cycle().await.unwrap().fired);

        h.source.replace(vec![Event::platform_error(7)]);
        let report = h.triage.run_cycle().await.unwrap();
        assert!(report.fired);
        assert_eq!(report.baseline, 5);
        // An unknown diagnosis only waits.
        assert!(!report.directive.unwrap().is_execute());
        assert_eq!(h.triage.baseline(), Some(7));
    }

    #[tokio::test]
    async fn test_baseline_policies() {
        let mut on_fire = harness(vec![Event::platform_error(5)], BaselinePolicy::OnFire);
        on_fire.triage.initialize().await.unwrap();
        on_fire.source.replace(vec![Event::platform_error(3)]);
        on_fire.triage.run_cycle().await.unwrap();
        assert_eq!(on_fire.triage.baseline(), Some(5));

        let mut every = harness(vec![Event::platform_error(5)], BaselinePolicy::EveryCycle);
        every.triage.initialize().await.unwrap();
        every.source.replace(vec![Event::platform_error(3)]);
        every.triage.run_cycle().await.unwrap();
        assert_eq!(every.triage.baseline(), Some(3));

        // A rise back to 5 fires only under the every-cycle policy.
        every.source.replace(vec![Event::platform_error(5)]);
        assert!(every.triage.run_cycle().await.unwrap().fired);
        on_fire.source.replace(vec![Event::platform_error(5)]);
        assert!(!on_fire.triage.run_cycle().await.unwrap().fired);
    }

    #[tokio::test]
    async fn test_unavailable_source_defers_baseline() {
        let mut h = harness(vec![Event::platform_error(5)], BaselinePolicy::OnFire);
        h.source.set_unavailable(true);

        assert_eq!(h.triage.initialize().await.unwrap(), None);
        let err = h.triage.run_cycle().await.unwrap_err();
        assert!(err.is_transient());

        h.source.set_unavailable(false);
        let report = h.triage.run_cycle().await.unwrap();
        assert!(!report.fired);
        assert_eq!(h.triage.baseline(), Some(5));
    }

    #[tokio::test]
    async fn test_loop_offers_to_desk() {
        use crate::executor::ActionExecutor;

        let mut h = harness(migration_events(), BaselinePolicy::OnFire);
        let executor = Arc::new(ActionExecutor::from_config(&TriageConfig::default()).unwrap());
        let desk = Arc::new(ReviewDesk::new(executor, h.memory.clone(), DecisionGate::default()));
        h.triage = h.triage.with_review_desk(desk.clone());
        h.triage.initialize().await.unwrap();

        let report = h.triage.run_cycle().await.unwrap();
        assert!(report.offered.is_some());
        assert_eq!(desk.view().await.review_id, report.offered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let mut h = harness(migration_events(), BaselinePolicy::OnFire);
        h.triage = h.triage.with_interval(Duration::from_secs(30));
        h.triage.initialize().await.unwrap();

        let trigger = Arc::new(Notify::new());
        let mut cycles = 0;
        let shutdown = tokio::time::sleep(Duration::from_secs(95));
        h.triage
            .run(shutdown, trigger, |_| cycles += 1)
            .await
            .unwrap();

        // Ticks at 0s, 30s, 60s and 90s.
        assert_eq!(cycles, 4);
    }
}
