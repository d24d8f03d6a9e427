//! API route modules.

pub mod audit;
pub mod health;
pub mod memory;
pub mod monitoring;
pub mod review;

use axum::{http::StatusCode, middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use triage_core::Error;

use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health::health_check));

    // Protected routes (require auth when a token is configured)
    let protected_routes = Router::new()
        .merge(review::router())
        .merge(memory::router())
        .merge(audit::router())
        .merge(monitoring::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .nest("/api", protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Map a core error onto an HTTP status and message
pub fn api_error(e: Error) -> (StatusCode, String) {
    let status = match &e {
        Error::InvalidTransition { .. } | Error::WorkflowBusy | Error::StaleReview { .. } => {
            StatusCode::CONFLICT
        }
        Error::NotActionable(_) | Error::InvalidConfidence(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::ActionFailed { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use triage_core::{Pipeline, TriageConfig};

    use crate::config::Config;
    use crate::state::AppState;

    /// State over a temp data dir holding `events`.
    pub fn state_with_events(dir: &Path, events: serde_json::Value, token: Option<&str>) -> Arc<AppState> {
        let events_path = dir.join("events.json");
        std::fs::write(&events_path, events.to_string()).unwrap();

        let mut triage = TriageConfig::default();
        triage.source.path = events_path;
        triage.storage.memory_path = dir.join("memory.json");
        triage.storage.audit_path = dir.join("audit.jsonl");
        triage.server.bind = "127.0.0.1:0".into();
        triage.server.api_token = token.map(String::from);

        let pipeline = Pipeline::from_config(triage.clone()).unwrap();
        let mut config = Config::from_triage(dir.join("config.toml"), triage).unwrap();
        config.api_token = token.map(String::from);
        AppState::new(config, pipeline)
    }
}
