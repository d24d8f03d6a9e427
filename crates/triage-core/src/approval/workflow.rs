//! The approval state machine.
//!
//! ```text
//! Idle ──propose──▶ Proposed ──approve──▶ ConfirmingApprove ──confirm──▶ Resolved ──┐
//!                     ▲  │                      │  (tool failed: back to Proposed) │
//!                     │  └──reject──▶ ConfirmingReject ──confirm──▶ Rejected ──────┤
//!                     └────cancel─────────┘                                         │
//! Idle ◀──────────────────────────────── acknowledge ───────────────────────────────┘
//! ```
//!
//! Invalid intents fail with `InvalidTransition` and leave the state as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::decision::Directive;
use crate::error::{Error, Result};
use crate::executor::{ActionExecutor, ExecutionResult};
use crate::memory::{MemoryStore, SubjectStatus};
use crate::types::Diagnosis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Idle,
    Proposed,
    ConfirmingApprove,
    ConfirmingReject,
    Resolved,
    Rejected,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Idle => "idle",
            ReviewState::Proposed => "proposed",
            ReviewState::ConfirmingApprove => "confirming_approve",
            ReviewState::ConfirmingReject => "confirming_reject",
            ReviewState::Resolved => "resolved",
            ReviewState::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewState::Resolved | ReviewState::Rejected)
    }

    pub fn is_confirming(&self) -> bool {
        matches!(
            self,
            ReviewState::ConfirmingApprove | ReviewState::ConfirmingReject
        )
    }

    /// Intents accepted in this state.
    pub fn allowed_intents(&self) -> Vec<Intent> {
        match self {
            ReviewState::Idle => vec![],
            ReviewState::Proposed => vec![Intent::Approve, Intent::Reject],
            ReviewState::ConfirmingApprove | ReviewState::ConfirmingReject => {
                vec![Intent::Confirm, Intent::Cancel]
            }
            ReviewState::Resolved | ReviewState::Rejected => vec![Intent::Acknowledge],
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A human response to the current review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Approve,
    Reject,
    Confirm,
    Cancel,
    Acknowledge,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Approve => "approve",
            Intent::Reject => "reject",
            Intent::Confirm => "confirm",
            Intent::Cancel => "cancel",
            Intent::Acknowledge => "acknowledge",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(Intent::Approve),
            "reject" => Some(Intent::Reject),
            "confirm" => Some(Intent::Confirm),
            "cancel" => Some(Intent::Cancel),
            "acknowledge" | "ack" => Some(Intent::Acknowledge),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The diagnosis currently under review.
#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub id: Uuid,
    pub diagnosis: Diagnosis,
    pub directive: Directive,
    pub proposed_at: DateTime<Utc>,
    /// Message of the last failed remediation attempt.
    pub last_error: Option<String>,
    /// Result of the last remediation attempt.
    pub outcome: Option<ExecutionResult>,
}

/// Read-only rendering of the workflow for presentation surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub state: ReviewState,
    pub review_id: Option<Uuid>,
    pub fingerprint: Option<String>,
    pub diagnosis: Option<Diagnosis>,
    pub directive: Option<Directive>,
    pub proposed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub outcome: Option<ExecutionResult>,
    pub allowed_intents: Vec<Intent>,
}

pub struct ApprovalWorkflow {
    state: ReviewState,
    proposal: Option<Proposal>,
}

impl ApprovalWorkflow {
    pub fn new() -> Self {
        Self {
            state: ReviewState::Idle,
            proposal: None,
        }
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn proposal(&self) -> Option<&Proposal> {
        self.proposal.as_ref()
    }

    /// Put an `Execute` directive up for review. Only valid while idle.
    pub fn propose(&mut self, diagnosis: Diagnosis, directive: Directive) -> Result<Uuid> {
        if self.state != ReviewState::Idle {
            return Err(Error::WorkflowBusy);
        }
        if !directive.is_execute() {
            return Err(Error::NotActionable(directive.action_type.to_string()));
        }

        let id = Uuid::new_v4();
        info!(
            review_id = %id,
            root_cause = %diagnosis.root_cause,
            subjects = diagnosis.affected_subject_ids.len(),
            "Diagnosis proposed for approval"
        );
        self.proposal = Some(Proposal {
            id,
            diagnosis,
            directive,
            proposed_at: Utc::now(),
            last_error: None,
            outcome: None,
        });
        self.state = ReviewState::Proposed;
        Ok(id)
    }

    pub fn approve_intent(&mut self) -> Result<()> {
        self.expect_state(ReviewState::Proposed, Intent::Approve)?;
        self.state = ReviewState::ConfirmingApprove;
        Ok(())
    }

    pub fn reject_intent(&mut self) -> Result<()> {
        self.expect_state(ReviewState::Proposed, Intent::Reject)?;
        self.state = ReviewState::ConfirmingReject;
        Ok(())
    }

    /// Back out of a confirmation. A no-op while merely proposed.
    pub fn cancel(&mut self) -> Result<()> {
        match self.state {
            ReviewState::ConfirmingApprove | ReviewState::ConfirmingReject => {
                self.state = ReviewState::Proposed;
                Ok(())
            }
            ReviewState::Proposed => Ok(()),
            state => Err(Error::invalid_transition(state.as_str(), Intent::Cancel.as_str())),
        }
    }

    /// Carry out the pending confirmation.
    ///
    /// Approval runs the executor and resolves the affected subjects only if
    /// the remediation executed; a failed remediation returns to `Proposed`
    /// with the error kept on the proposal. Rejection never calls the executor.
    pub async fn confirm(
        &mut self,
        executor: &ActionExecutor,
        memory: &dyn MemoryStore,
    ) -> Result<ReviewState> {
        let state = self.state;
        let proposal = match (state, self.proposal.as_mut()) {
            (ReviewState::ConfirmingApprove | ReviewState::ConfirmingReject, Some(p)) => p,
            _ => {
                return Err(Error::invalid_transition(
                    state.as_str(),
                    Intent::Confirm.as_str(),
                ));
            }
        };

        if state == ReviewState::ConfirmingReject {
            memory.update(
                &proposal.diagnosis.affected_subject_ids,
                &proposal.diagnosis,
                SubjectStatus::Rejected,
            )?;
            info!(review_id = %proposal.id, "Diagnosis rejected");
            self.state = ReviewState::Rejected;
            return Ok(self.state);
        }

        let result = executor.act(&proposal.directive, &proposal.diagnosis).await;
        if !result.is_executed() {
            warn!(
                review_id = %proposal.id,
                status = %result.status,
                error = %result.message,
                "Remediation did not execute; review returned to proposed"
            );
            proposal.last_error = Some(result.message.clone());
            proposal.outcome = Some(result);
            self.state = ReviewState::Proposed;
            return Ok(self.state);
        }

        proposal.outcome = Some(result);
        if let Err(e) = memory.update(
            &proposal.diagnosis.affected_subject_ids,
            &proposal.diagnosis,
            SubjectStatus::Resolved,
        ) {
            proposal.last_error = Some(e.to_string());
            return Err(e);
        }

        info!(
            review_id = %proposal.id,
            subjects = proposal.diagnosis.affected_subject_ids.len(),
            "Diagnosis approved and resolved"
        );
        proposal.last_error = None;
        self.state = ReviewState::Resolved;
        Ok(self.state)
    }

    /// Close a finished review and return to idle.
    pub fn acknowledge(&mut self) -> Result<()> {
        if !self.state.is_terminal() {
            return Err(Error::invalid_transition(
                self.state.as_str(),
                Intent::Acknowledge.as_str(),
            ));
        }
        self.proposal = None;
        self.state = ReviewState::Idle;
        Ok(())
    }

    /// Dispatch an intent to the matching transition.
    pub async fn apply(
        &mut self,
        intent: Intent,
        executor: &ActionExecutor,
        memory: &dyn MemoryStore,
    ) -> Result<ReviewState> {
        match intent {
            Intent::Approve => self.approve_intent()?,
            Intent::Reject => self.reject_intent()?,
            Intent::Cancel => self.cancel()?,
            Intent::Acknowledge => self.acknowledge()?,
            Intent::Confirm => return self.confirm(executor, memory).await,
        }
        Ok(self.state)
    }

    pub fn view(&self) -> ReviewView {
        let proposal = self.proposal.as_ref();
        ReviewView {
            state: self.state,
            review_id: proposal.map(|p| p.id),
            fingerprint: proposal.map(|p| p.diagnosis.fingerprint()),
            diagnosis: proposal.map(|p| p.diagnosis.clone()),
            directive: proposal.map(|p| p.directive.clone()),
            proposed_at: proposal.map(|p| p.proposed_at),
            last_error: proposal.and_then(|p| p.last_error.clone()),
            outcome: proposal.and_then(|p| p.outcome.clone()),
            allowed_intents: self.state.allowed_intents(),
        }
    }

    fn expect_state(&self, expected: ReviewState, intent: Intent) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::invalid_transition(self.state.as_str(), intent.as_str()))
        }
    }
}

impl Default for ApprovalWorkflow {
    fn default() -> Self {
        Self::new()
    }
}
