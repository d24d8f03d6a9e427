//! Authentication middleware for triage-server.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (error, code) = match self {
            AuthError::MissingToken => ("Missing authentication token", "MISSING_TOKEN"),
            AuthError::InvalidToken => ("Invalid authentication token", "INVALID_TOKEN"),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        });

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Authentication middleware for axum
///
/// Passes every request through when no token is configured.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(expected) = &state.api_token else {
        return Ok(next.run(request).await);
    };

    let token_str = match request.headers().get(header::AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AuthError::InvalidToken)?,
        None => return Err(AuthError::MissingToken),
    };

    // Remove "Bearer " prefix if present
    let token_str = token_str.trim_start_matches("Bearer ").trim();

    if !expected.verify(token_str) {
        warn!(path = %request.uri().path(), "Rejected request with invalid token");
        return Err(AuthError::InvalidToken);
    }

    Ok(next.run(request).await)
}
