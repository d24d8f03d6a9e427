//! Monitoring control routes.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::api_error;
use crate::services::{MonitoringStatus, ScanOutcome};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/monitoring/status", get(get_monitoring_status))
        .route("/monitoring/start", post(start_monitoring))
        .route("/monitoring/stop", post(stop_monitoring))
        .route("/scan", post(scan))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartMonitoringRequest {
    pub interval_secs: Option<u64>,
}

pub async fn get_monitoring_status(State(state): State<Arc<AppState>>) -> Json<MonitoringStatus> {
    Json(state.monitoring.status().await)
}

/// Start (or restart) the background loop
pub async fn start_monitoring(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartMonitoringRequest>>,
) -> Result<Json<MonitoringStatus>, (StatusCode, String)> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    if req.interval_secs == Some(0) {
        return Err((
            StatusCode::BAD_REQUEST,
            "interval_secs must be greater than 0".to_string(),
        ));
    }

    state
        .monitoring
        .start(req.interval_secs)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn stop_monitoring(State(state): State<Arc<AppState>>) -> Json<MonitoringStatus> {
    Json(state.monitoring.stop().await)
}

/// Run a cycle now, or wake the running loop
pub async fn scan(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScanOutcome>, (StatusCode, String)> {
    state.monitoring.scan().await.map(Json).map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::super::{create_router, test_support::state_with_events};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn post_json(router: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_start_and_stop_monitoring() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(state_with_events(dir.path(), json!([]), None));

        let (status, body) =
            post_json(&router, "/api/monitoring/start", json!({ "interval_secs": 600 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], true);
        assert_eq!(body["interval_secs"], 600);

        let (_, body) = post_json(&router, "/api/scan", json!({})).await;
        assert_eq!(body["triggered"], true);

        let (_, body) = post_json(&router, "/api/monitoring/stop", json!({})).await;
        assert_eq!(body["active"], false);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let router = create_router(state_with_events(dir.path(), json!([]), None));

        let (status, _) =
            post_json(&router, "/api/monitoring/start", json!({ "interval_secs": 0 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
