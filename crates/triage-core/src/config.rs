//! Configuration management for signal triage.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. `TRIAGE_CONFIG` (explicit config file path)
//! 2. Config file (`<data dir>/config.toml`, data dir overridable via `TRIAGE_HOME`)
//! 3. Default values

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::RiskLevel;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Polling loop settings
    pub monitoring: MonitoringConfig,

    /// Decision gate settings
    pub decision: DecisionConfig,

    /// Root cause to risk level mapping
    pub risk: RiskConfig,

    /// Diagnosis rule tuning
    pub rules: RulesConfig,

    /// Event source settings
    pub source: SourceConfig,

    /// Memory and audit persistence
    pub storage: StorageConfig,

    /// Remediation settings
    pub executor: ExecutorConfig,

    /// HTTP review API settings
    pub server: ServerConfig,
}

/// How the error-volume baseline advances between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Baseline moves only when reasoning fired.
    #[default]
    OnFire,
    /// Baseline follows the last observed volume.
    EveryCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Polling interval in seconds
    pub interval_secs: u64,

    /// Baseline advance policy
    pub baseline_policy: BaselinePolicy,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            baseline_policy: BaselinePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Confidence at or above which a diagnosis is proposed for remediation
    pub escalation_threshold: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Risk level per root cause; unlisted causes fall back to the confidence band
    pub levels: HashMap<String, RiskLevel>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let mut levels = HashMap::new();
        levels.insert("migration_misconfiguration".to_string(), RiskLevel::Medium);
        levels.insert("unknown".to_string(), RiskLevel::Low);
        Self { levels }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub migration: MigrationRuleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationRuleConfig {
    /// Minimum distinct ticket subjects
    pub min_distinct_subjects: usize,

    /// Minimum summed platform error count
    pub min_error_volume: u64,

    /// Confidence assigned when the rule matches
    pub confidence: f64,

    /// Remediation tool to propose
    pub tool: String,
}

impl Default for MigrationRuleConfig {
    fn default() -> Self {
        Self {
            min_distinct_subjects: 2,
            min_error_volume: 1,
            confidence: 0.8,
            tool: "notify_subjects".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Document,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Event document path (document sources)
    pub path: PathBuf,

    /// Event endpoint (http sources)
    pub url: Option<String>,

    /// Fetch timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Document,
            path: default_data_dir().join("events.json"),
            url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Memory document (json) or database file (sqlite)
    pub memory_path: PathBuf,

    /// Audit log, one JSON entry per line
    pub audit_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            backend: StorageBackend::Json,
            memory_path: data_dir.join("memory.json"),
            audit_path: data_dir.join("audit.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Remediation tool timeout in seconds
    pub timeout_secs: u64,

    /// Webhook tools: tool name -> URL
    pub webhooks: HashMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            webhooks: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,

    /// Bearer token required on /api routes when set
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7040".to_string(),
            api_token: std::env::var("TRIAGE_API_TOKEN").ok(),
        }
    }
}

/// Base directory for triage data
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TRIAGE_HOME") {
        return PathBuf::from(dir);
    }
    if let Some(proj_dirs) = ProjectDirs::from("dev", "signal-triage", "triage") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".triage")
    }
}

impl TriageConfig {
    /// Load configuration from file, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let config: TriageConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            TriageConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TRIAGE_CONFIG") {
            PathBuf::from(path)
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let threshold = self.decision.escalation_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "decision.escalation_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.rules.migration.confidence) {
            return Err(Error::Config(format!(
                "rules.migration.confidence must be within [0, 1], got {}",
                self.rules.migration.confidence
            )));
        }

        if self.monitoring.interval_secs == 0 {
            return Err(Error::Config(
                "monitoring.interval_secs must be greater than 0".into(),
            ));
        }

        if self.source.timeout_secs == 0 || self.executor.timeout_secs == 0 {
            return Err(Error::Config("timeouts must be greater than 0".into()));
        }

        if self.source.kind == SourceKind::Http && self.source.url.is_none() {
            return Err(Error::Config("source.url is required for http sources".into()));
        }

        Ok(())
    }

    /// Ensure the directories holding persisted state exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        for path in [&self.storage.memory_path, &self.storage.audit_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(())
    }
}
