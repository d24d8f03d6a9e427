//! Audit log routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use triage_core::AuditEntry;

use super::api_error;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/audit", get(list_audit))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Return only the newest `limit` entries
    pub limit: Option<usize>,
}

/// Audit entries, oldest first
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, (StatusCode, String)> {
    let mut entries = state.pipeline.audit.entries().map_err(api_error)?;
    if let Some(limit) = query.limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }
    Ok(Json(entries))
}
