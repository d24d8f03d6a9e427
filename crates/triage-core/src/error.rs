//! Error types for triage-core.

use thiserror::Error;

/// Result type alias using triage-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for triage operations
#[derive(Error, Debug)]
pub enum Error {
    // Event source errors
    #[error("Event source unavailable: {0}")]
    SourceUnavailable(String),

    // Persisted state errors
    #[error("Memory store is corrupt: {0}")]
    MemoryCorrupt(String),

    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    // Remediation errors
    #[error("Action failed: {tool}: {message}")]
    ActionFailed { tool: String, message: String },

    // Model validation errors
    #[error("Confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    // Approval workflow errors
    #[error("Cannot {intent} while review is {state}")]
    InvalidTransition { state: String, intent: String },

    #[error("A diagnosis is already under review")]
    WorkflowBusy,

    #[error("Directive {0} cannot be proposed for approval")]
    NotActionable(String),

    #[error("Stale review: expected {expected}, active review is {actual}")]
    StaleReview { expected: String, actual: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an invalid transition error
    pub fn invalid_transition(state: impl Into<String>, intent: impl Into<String>) -> Self {
        Self::InvalidTransition {
            state: state.into(),
            intent: intent.into(),
        }
    }

    /// Create an action failure error
    pub fn action_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActionFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Transient errors are retried on the next poll instead of stopping the loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_) | Self::ActionFailed { .. })
    }

    /// Persisted state could not be trusted.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::MemoryCorrupt(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::SourceUnavailable("down".into()).is_transient());
        assert!(Error::action_failed("notify_subjects", "timeout").is_transient());
        assert!(!Error::MemoryCorrupt("bad json".into()).is_transient());
        assert!(Error::MemoryCorrupt("bad json".into()).is_corrupt());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = Error::invalid_transition("idle", "confirm");
        assert_eq!(err.to_string(), "Cannot confirm while review is idle");
    }
}
