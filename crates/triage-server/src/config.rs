//! Server configuration.

use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;

use triage_core::TriageConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to configuration file
    pub config_path: PathBuf,
    /// Pipeline configuration
    pub triage: TriageConfig,
    /// Listen address
    pub bind: SocketAddr,
    /// Bearer token required on /api routes
    pub api_token: Option<String>,
    /// Start the monitoring loop on boot
    pub autostart_monitoring: bool,
}

impl Config {
    /// Load configuration from file or defaults
    ///
    /// Environment overrides:
    /// - `TRIAGE_SERVER_BIND`: listen address
    /// - `TRIAGE_MONITORING_AUTOSTART`: `0`/`false` to start idle
    pub fn load() -> anyhow::Result<Self> {
        let config_path = TriageConfig::config_path();
        let triage = TriageConfig::load_from(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        Self::from_triage(config_path, triage)
    }

    pub fn from_triage(config_path: PathBuf, triage: TriageConfig) -> anyhow::Result<Self> {
        let bind = std::env::var("TRIAGE_SERVER_BIND").unwrap_or_else(|_| triage.server.bind.clone());
        let bind: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid bind address {}", bind))?;

        let autostart_monitoring = std::env::var("TRIAGE_MONITORING_AUTOSTART")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        let api_token = triage
            .server
            .api_token
            .clone()
            .filter(|t| !t.trim().is_empty());

        Ok(Self {
            config_path,
            triage,
            bind,
            api_token,
            autostart_monitoring,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_disables_auth() {
        let mut triage = TriageConfig::default();
        triage.server.bind = "127.0.0.1:0".into();
        triage.server.api_token = Some("  ".into());

        let config = Config::from_triage(PathBuf::from("config.toml"), triage).unwrap();
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let mut triage = TriageConfig::default();
        triage.server.bind = "not-an-address".into();
        // Only meaningful when the environment does not override the bind.
        if std::env::var("TRIAGE_SERVER_BIND").is_err() {
            assert!(Config::from_triage(PathBuf::from("config.toml"), triage).is_err());
        }
    }
}
