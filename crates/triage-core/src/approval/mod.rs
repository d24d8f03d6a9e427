//! Human-in-the-loop approval.
//!
//! [`ApprovalWorkflow`] is the state machine for one diagnosis under review.
//! [`ReviewDesk`] owns it, serialises access from the polling loop and the
//! presentation surfaces, and re-offers subjects that memory still holds as
//! awaiting approval.

mod desk;
mod workflow;

pub use desk::ReviewDesk;
pub use workflow::{ApprovalWorkflow, Intent, Proposal, ReviewState, ReviewView};

use async_trait::async_trait;

use crate::error::Result;

/// A presentation surface that answers reviews.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Next intent for the review shown in `view`, or `None` to leave it open.
    async fn next_intent(&self, view: &ReviewView) -> Result<Option<Intent>>;
}
