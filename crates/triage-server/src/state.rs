//! Application state.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

use triage_core::Pipeline;

use crate::config::Config;
use crate::services::MonitoringService;

/// Bearer token accepted on /api routes, kept only as a digest
#[derive(Debug, Clone)]
pub struct ApiToken {
    digest: String,
}

impl ApiToken {
    pub fn new(token: &str) -> Self {
        Self {
            digest: digest(token),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        digest(candidate) == self.digest
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Pipeline components (memory, audit, review desk)
    pub pipeline: Arc<Pipeline>,
    /// Background triage loop
    pub monitoring: Arc<MonitoringService>,
    /// Required bearer token, if any
    pub api_token: Option<ApiToken>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, pipeline: Pipeline) -> Arc<Self> {
        let pipeline = Arc::new(pipeline);
        Arc::new(Self {
            api_token: config.api_token.as_deref().map(ApiToken::new),
            monitoring: Arc::new(MonitoringService::new(Arc::clone(&pipeline))),
            pipeline,
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_token_verify() {
        let token = ApiToken::new("s3cret");
        assert!(token.verify("s3cret"));
        assert!(!token.verify("s3cret "));
        assert!(!token.verify(""));
    }
}
