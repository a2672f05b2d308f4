//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::NodeError;

/// Configuration for a docket node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the record mirror.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the ledger gateway.
    #[serde(default = "default_ledger_url")]
    pub ledger_url: String,

    /// Maximum submission attempts per payload (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base retry delay in seconds; delays double from this base (60, 120, 240, ...).
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Ledger submit timeout in seconds.
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,

    /// How often the SLA tracker scans for breached deadlines, seconds.
    #[serde(default = "default_sla_scan_interval_secs")]
    pub sla_scan_interval_secs: u64,

    /// Default SLA window applied at assignment, in hours.
    #[serde(default = "default_sla_hours")]
    pub default_sla_hours: u64,

    /// Maximum breached cases handled per SLA scan.
    #[serde(default = "default_escalation_batch_size")]
    pub escalation_batch_size: usize,

    /// How often the reconciler pulls ledger events, seconds.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// How often the failed-record sweep runs, seconds.
    #[serde(default = "default_retry_sweep_interval_secs")]
    pub retry_sweep_interval_secs: u64,

    /// Failed records older than this are left alone by the sweep, seconds.
    #[serde(default = "default_retry_sweep_max_age_secs")]
    pub retry_sweep_max_age_secs: u64,

    /// Directory for the evidence content store.
    #[serde(default = "default_evidence_dir")]
    pub evidence_dir: PathBuf,

    /// Whether to enable Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./docket_data")
}

fn default_ledger_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    60
}

fn default_submit_timeout_secs() -> u64 {
    120
}

fn default_sla_scan_interval_secs() -> u64 {
    900
}

fn default_sla_hours() -> u64 {
    48
}

fn default_escalation_batch_size() -> usize {
    50
}

fn default_reconcile_interval_secs() -> u64 {
    600
}

fn default_retry_sweep_interval_secs() -> u64 {
    3600
}

fn default_retry_sweep_max_age_secs() -> u64 {
    86400
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("./docket_evidence")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn default_sla_secs(&self) -> u64 {
        self.default_sla_hours * 3600
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            ledger_url: default_ledger_url(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
            sla_scan_interval_secs: default_sla_scan_interval_secs(),
            default_sla_hours: default_sla_hours(),
            escalation_batch_size: default_escalation_batch_size(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            retry_sweep_interval_secs: default_retry_sweep_interval_secs(),
            retry_sweep_max_age_secs: default_retry_sweep_max_age_secs(),
            evidence_dir: default_evidence_dir(),
            enable_metrics: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.max_attempts, config.max_attempts);
        assert_eq!(parsed.base_delay_secs, config.base_delay_secs);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_secs, 60);
        assert_eq!(config.submit_timeout_secs, 120);
        assert_eq!(config.default_sla_hours, 48);
        assert_eq!(config.escalation_batch_size, 50);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            max_attempts = 5
            sla_scan_interval_secs = 60
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.sla_scan_interval_secs, 60);
        assert_eq!(config.base_delay_secs, 60); // default
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/docket.toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
