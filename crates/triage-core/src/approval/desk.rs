use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ApprovalWorkflow, Intent, ReviewState, ReviewView, Reviewer};
use crate::decision::{DecisionGate, Directive};
use crate::error::{Error, Result};
use crate::executor::ActionExecutor;
use crate::memory::MemoryStore;
use crate::types::Diagnosis;

/// Owner of the approval workflow.
///
/// All access goes through one async mutex, so the loop's re-offer and
/// reviewer intents never interleave inside a transition.
pub struct ReviewDesk {
    workflow: Mutex<ApprovalWorkflow>,
    executor: Arc<ActionExecutor>,
    memory: Arc<dyn MemoryStore>,
    gate: DecisionGate,
}

impl ReviewDesk {
    pub fn new(
        executor: Arc<ActionExecutor>,
        memory: Arc<dyn MemoryStore>,
        gate: DecisionGate,
    ) -> Self {
        Self {
            workflow: Mutex::new(ApprovalWorkflow::new()),
            executor,
            memory,
            gate,
        }
    }

    pub async fn view(&self) -> ReviewView {
        self.workflow.lock().await.view()
    }

    pub async fn state(&self) -> ReviewState {
        self.workflow.lock().await.state()
    }

    pub async fn propose(&self, diagnosis: Diagnosis, directive: Directive) -> Result<Uuid> {
        self.workflow.lock().await.propose(diagnosis, directive)
    }

    /// Propose the newest diagnosis memory still holds as awaiting approval.
    ///
    /// Does nothing unless the workflow is idle. Only subjects still pending
    /// are carried into the proposal.
    pub async fn offer_pending(&self) -> Result<Option<Uuid>> {
        let mut workflow = self.workflow.lock().await;
        if workflow.state() != ReviewState::Idle {
            return Ok(None);
        }

        let snapshot = self.memory.load()?;
        for pending in snapshot.pending_approval() {
            let mut diagnosis = pending.diagnosis;
            diagnosis.affected_subject_ids = pending.subjects;

            let directive = self.gate.decide(&diagnosis);
            if !directive.is_execute() {
                debug!(
                    root_cause = %diagnosis.root_cause,
                    action = %directive.action_type,
                    "Pending diagnosis no longer clears the gate"
                );
                continue;
            }

            let id = workflow.propose(diagnosis, directive)?;
            info!(review_id = %id, "Re-offered pending diagnosis");
            return Ok(Some(id));
        }

        Ok(None)
    }

    /// Apply an intent. When `review_id` is given it must name the active review.
    pub async fn submit(&self, intent: Intent, review_id: Option<Uuid>) -> Result<ReviewView> {
        let mut workflow = self.workflow.lock().await;

        if let Some(expected) = review_id {
            let actual = workflow.proposal().map(|p| p.id);
            if actual != Some(expected) {
                return Err(Error::StaleReview {
                    expected: expected.to_string(),
                    actual: actual
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                });
            }
        }

        workflow
            .apply(intent, &self.executor, self.memory.as_ref())
            .await?;
        Ok(workflow.view())
    }

    /// Run the current review to completion with `reviewer`.
    ///
    /// Offers a pending diagnosis first when idle. Returns the terminal view
    /// (already acknowledged), the open view if the reviewer deferred, or
    /// `None` when there was nothing to review.
    pub async fn drive(&self, reviewer: &dyn Reviewer) -> Result<Option<ReviewView>> {
        self.offer_pending().await?;

        let mut view = self.view().await;
        let Some(review_id) = view.review_id else {
            return Ok(None);
        };

        loop {
            if view.state.is_terminal() {
                self.submit(Intent::Acknowledge, Some(review_id)).await?;
                return Ok(Some(view));
            }

            let Some(intent) = reviewer.next_intent(&view).await? else {
                debug!(review_id = %review_id, "Reviewer deferred");
                return Ok(Some(view));
            };

            view = self.submit(intent, Some(review_id)).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NotifySubjectsTool;
    use crate::memory::{test_support::diagnosis_for, InMemoryStore, SubjectStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedReviewer {
        script: std::sync::Mutex<VecDeque<Intent>>,
    }

    impl ScriptedReviewer {
        fn new(intents: &[Intent]) -> Self {
            Self {
                script: std::sync::Mutex::new(intents.iter().copied().collect()),
            }
        }
    }

    #[async_trait]
    impl Reviewer for ScriptedReviewer {
        async fn next_intent(&self, _view: &ReviewView) -> Result<Option<Intent>> {
            Ok(self.script.lock().unwrap().pop_front())
        }
    }

    fn desk(memory: Arc<InMemoryStore>) -> ReviewDesk {
        let mut executor = ActionExecutor::new(Duration::from_secs(5));
        executor.register(Arc::new(NotifySubjectsTool::new()));
        ReviewDesk::new(Arc::new(executor), memory, DecisionGate::default())
    }

    fn seed_pending(memory: &InMemoryStore, subjects: &[&str]) {
        let diagnosis = diagnosis_for("migration_misconfiguration", subjects);
        memory
            .update(
                &diagnosis.affected_subject_ids.clone(),
                &diagnosis,
                SubjectStatus::PendingApproval,
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_offer_pending_from_memory() {
        let memory = Arc::new(InMemoryStore::new());
        seed_pending(&memory, &["a", "b"]);
        let desk = desk(memory.clone());

        let id = desk.offer_pending().await.unwrap();
        assert!(id.is_some());
        assert_eq!(desk.state().await, ReviewState::Proposed);

        // Already busy: nothing more is offered.
        assert!(desk.offer_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offer_pending_skips_resolved_subjects() {
        let memory = Arc::new(InMemoryStore::new());
        seed_pending(&memory, &["a", "b"]);
        let resolved = diagnosis_for("migration_misconfiguration", &["a", "b"]);
        memory
            .update(&["a".to_string()].into(), &resolved, SubjectStatus::Resolved)
            .unwrap();

        let desk = desk(memory);
        desk.offer_pending().await.unwrap();
        let view = desk.view().await;
        assert_eq!(
            view.diagnosis.unwrap().affected_subject_ids,
            ["b".to_string()].into()
        );
    }

    #[tokio::test]
    async fn test_drive_approves_and_acknowledges() {
        let memory = Arc::new(InMemoryStore::new());
        seed_pending(&memory, &["a"]);
        let desk = desk(memory.clone());

        let reviewer = ScriptedReviewer::new(&[Intent::Approve, Intent::Confirm]);
        let view = desk.drive(&reviewer).await.unwrap().unwrap();

        assert_eq!(view.state, ReviewState::Resolved);
        assert_eq!(desk.state().await, ReviewState::Idle);
        assert!(memory.load().unwrap().is_resolved("a"));
    }

    #[tokio::test]
    async fn test_drive_with_nothing_pending() {
        let desk = desk(Arc::new(InMemoryStore::new()));
        let reviewer = ScriptedReviewer::new(&[Intent::Approve]);
        assert!(desk.drive(&reviewer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drive_defer_leaves_review_open() {
        let memory = Arc::new(InMemoryStore::new());
        seed_pending(&memory, &["a"]);
        let desk = desk(memory.clone());

        let reviewer = ScriptedReviewer::new(&[Intent::Reject, Intent::Cancel]);
        let view = desk.drive(&reviewer).await.unwrap().unwrap();
        assert_eq!(view.state, ReviewState::Proposed);
        assert_eq!(
            memory.load().unwrap().status_of("a"),
            Some(SubjectStatus::PendingApproval)
        );
    }

    #[tokio::test]
    async fn test_stale_review_id_rejected() {
        let memory = Arc::new(InMemoryStore::new());
        seed_pending(&memory, &["a"]);
        let desk = desk(memory);
        desk.offer_pending().await.unwrap();

        let result = desk.submit(Intent::Approve, Some(Uuid::new_v4())).await;
        assert!(matches!(result, Err(Error::StaleReview { .. })));
        assert_eq!(desk.state().await, ReviewState::Proposed);
    }
}
