//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use triage_core::ReviewState;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub auth_required: bool,
    pub components: HealthComponents,
    pub review_state: ReviewState,
}

#[derive(Serialize)]
pub struct HealthComponents {
    pub memory: bool,
    pub audit: bool,
    pub monitoring: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let memory_healthy = state.pipeline.memory.load().is_ok();
    let audit_healthy = state.pipeline.audit.entries().is_ok();
    let monitoring_active = state.monitoring.is_active().await;

    // A stopped loop is not a fault
    let status = if memory_healthy && audit_healthy {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        auth_required: state.config.api_token.is_some(),
        components: HealthComponents {
            memory: memory_healthy,
            audit: audit_healthy,
            monitoring: monitoring_active,
        },
        review_state: state.pipeline.desk.state().await,
    })
}
