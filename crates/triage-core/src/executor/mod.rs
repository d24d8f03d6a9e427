//! Action executor - the only component allowed to cause side effects.
//!
//! Remediation failures never escape as errors: they come back as a
//! `Failed` result carrying the underlying message, so the reviewer can see
//! what went wrong and retry safely.

mod tools;

pub use tools::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::TriageConfig;
use crate::decision::{ActionType, Directive};
use crate::error::Result;
use crate::types::Diagnosis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Executed,
    PendingApproval,
    Monitoring,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Executed => "executed",
            ExecutionStatus::PendingApproval => "pending_approval",
            ExecutionStatus::Monitoring => "monitoring",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of acting on a directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
}

impl ExecutionResult {
    fn failed(message: String) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            message,
            tool_result: None,
        }
    }

    pub fn is_executed(&self) -> bool {
        self.status == ExecutionStatus::Executed
    }
}

/// An external remediation capability.
///
/// Tools should be idempotent: a failed approval may be retried.
#[async_trait]
pub trait RemediationTool: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, diagnosis: &Diagnosis) -> Result<Value>;
}

pub struct ActionExecutor {
    tools: HashMap<String, Arc<dyn RemediationTool>>,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            timeout,
        }
    }

    /// Executor with the local notifier and any configured webhooks.
    pub fn from_config(config: &TriageConfig) -> Result<Self> {
        let mut executor = Self::new(Duration::from_secs(config.executor.timeout_secs));
        executor.register(Arc::new(NotifySubjectsTool::new()));

        for (name, url) in &config.executor.webhooks {
            #[cfg(feature = "client")]
            executor.register(Arc::new(WebhookTool::new(
                name.clone(),
                url.clone(),
                executor.timeout,
            )?));

            #[cfg(not(feature = "client"))]
            warn!(tool = %name, url = %url, "Webhook tools need the `client` feature; skipping");
        }

        Ok(executor)
    }

    pub fn register(&mut self, tool: Arc<dyn RemediationTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Act on a directive. Only `Execute` touches a tool.
    pub async fn act(&self, directive: &Directive, diagnosis: &Diagnosis) -> ExecutionResult {
        match directive.action_type {
            ActionType::Execute => self.execute(directive, diagnosis).await,
            ActionType::Escalate => ExecutionResult {
                status: ExecutionStatus::PendingApproval,
                message: format!("Escalated for human investigation: {}", directive.target_action),
                tool_result: None,
            },
            ActionType::Wait => ExecutionResult {
                status: ExecutionStatus::Monitoring,
                message: format!("Monitoring: {}", directive.target_action),
                tool_result: None,
            },
        }
    }

    async fn execute(&self, directive: &Directive, diagnosis: &Diagnosis) -> ExecutionResult {
        let Some(name) = directive.tool.as_deref() else {
            return ExecutionResult::failed("Execute directive names no tool".to_string());
        };

        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "No remediation tool registered");
            return ExecutionResult::failed(format!("No remediation tool registered as {}", name));
        };

        match tokio::time::timeout(self.timeout, tool.invoke(diagnosis)).await {
            Ok(Ok(output)) => {
                info!(
                    tool = %name,
                    subjects = diagnosis.affected_subject_ids.len(),
                    "Remediation executed"
                );
                ExecutionResult {
                    status: ExecutionStatus::Executed,
                    message: format!("Executed {}: {}", name, directive.target_action),
                    tool_result: Some(output),
                }
            }
            Ok(Err(e)) => {
                error!(tool = %name, error = %e, "Remediation failed");
                ExecutionResult::failed(e.to_string())
            }
            Err(_) => {
                error!(tool = %name, timeout_secs = self.timeout.as_secs(), "Remediation timed out");
                ExecutionResult::failed(format!(
                    "{} timed out after {}s",
                    name,
                    self.timeout.as_secs()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionGate;
    use crate::error::Error;
    use crate::memory::test_support::diagnosis_for;

    struct FailingTool;

    #[async_trait]
    impl RemediationTool for FailingTool {
        fn name(&self) -> &str {
            "notify_subjects"
        }

        async fn invoke(&self, _diagnosis: &Diagnosis) -> Result<Value> {
            Err(Error::action_failed("notify_subjects", "smtp relay refused connection"))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl RemediationTool for SlowTool {
        fn name(&self) -> &str {
            "notify_subjects"
        }

        async fn invoke(&self, _diagnosis: &Diagnosis) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn test_execute_runs_tool() {
        let executor = ActionExecutor::from_config(&TriageConfig::default()).unwrap();
        let diagnosis = diagnosis_for("migration_misconfiguration", &["m-1", "m-2"]);
        let directive = DecisionGate::default().decide(&diagnosis);

        let result = executor.act(&directive, &diagnosis).await;
        assert_eq!(result.status, ExecutionStatus::Executed);
        let output = result.tool_result.unwrap();
        assert_eq!(output["notified"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_error_reported_as_failed() {
        let mut executor = ActionExecutor::new(Duration::from_secs(5));
        executor.register(Arc::new(FailingTool));
        let diagnosis = diagnosis_for("migration_misconfiguration", &["m-1"]);
        let directive = DecisionGate::default().decide(&diagnosis);

        let result = executor.act(&directive, &diagnosis).await;
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.message.contains("smtp relay refused connection"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout_reported_as_failed() {
        let mut executor = ActionExecutor::new(Duration::from_secs(1));
        executor.register(Arc::new(SlowTool));
        let diagnosis = diagnosis_for("migration_misconfiguration", &["m-1"]);
        let directive = DecisionGate::default().decide(&diagnosis);

        let result = executor.act(&directive, &diagnosis).await;
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unknown_tool_fails() {
        let executor = ActionExecutor::new(Duration::from_secs(1));
        let diagnosis = diagnosis_for("migration_misconfiguration", &["m-1"]);
        let directive = DecisionGate::default().decide(&diagnosis);

        let result = executor.act(&directive, &diagnosis).await;
        assert_eq!(result.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_non_execute_directives_have_no_side_effects() {
        let executor = ActionExecutor::new(Duration::from_secs(1));
        let diagnosis = diagnosis_for("unknown", &["m-1"]);

        let wait = Directive {
            action_type: ActionType::Wait,
            tool: None,
            target_action: "Wait for more data".into(),
        };
        assert_eq!(executor.act(&wait, &diagnosis).await.status, ExecutionStatus::Monitoring);

        let escalate = Directive {
            action_type: ActionType::Escalate,
            tool: None,
            target_action: "Investigate manually".into(),
        };
        assert_eq!(
            executor.act(&escalate, &diagnosis).await.status,
            ExecutionStatus::PendingApproval
        );
    }
}
