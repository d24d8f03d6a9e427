//! Review desk routes.
//!
//! `GET /review` returns the current view with its allowed intents.
//! `POST /review/{intent}` submits one intent; pass `?review_id=` to guard
//! against acting on a review that was replaced in the meantime.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use triage_core::{Intent, ReviewView};

use super::api_error;
use crate::state::AppState;

/// Create review router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/review", get(get_review))
        .route("/review/{intent}", post(submit_intent))
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuery {
    pub review_id: Option<Uuid>,
}

/// Current review view
pub async fn get_review(State(state): State<Arc<AppState>>) -> Json<ReviewView> {
    Json(state.pipeline.desk.view().await)
}

/// Submit an intent to the review desk
pub async fn submit_intent(
    State(state): State<Arc<AppState>>,
    Path(intent): Path<String>,
    Query(query): Query<SubmitQuery>,
) -> Result<Json<ReviewView>, (StatusCode, String)> {
    let intent = Intent::from_str(&intent)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Unknown intent: {}", intent)))?;

    let view = state
        .pipeline
        .desk
        .submit(intent, query.review_id)
        .await
        .map_err(api_error)?;

    info!(intent = %intent.as_str(), state = %view.state.as_str(), "Review intent applied");
    Ok(Json(view))
}
