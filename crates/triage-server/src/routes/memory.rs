//! Subject memory routes.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use triage_core::MemorySnapshot;

use super::api_error;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/memory", get(get_memory))
}

/// Full memory snapshot keyed by subject id
pub async fn get_memory(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MemorySnapshot>, (StatusCode, String)> {
    state.pipeline.memory.load().map(Json).map_err(api_error)
}
