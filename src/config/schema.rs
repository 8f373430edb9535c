//! Settings schema definitions.
//!
//! This module defines the complete settings structure for the backend.
//! All types derive Serde traits for deserialization from the TOML file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings for the management backend.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    /// HTTP listener and web UI.
    pub server: ServerConfig,

    /// Routing engine (sing-box) configuration handling.
    pub engine: SingBoxConfig,

    /// DNS proxy (mosdns) service.
    pub dns: DnsConfig,

    /// Backups of raw configuration saves.
    pub backup: BackupConfig,

    /// Restart verification timing.
    pub rollback: RollbackConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Directory holding the built web UI.
    pub web_dir: PathBuf,

    /// Bearer token required on `/api` when set.
    pub api_key: Option<String>,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Answer cross-origin requests from browser UIs served elsewhere.
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 60,
            web_dir: PathBuf::from("./web/dist"),
            api_key: None,
            max_body_bytes: 4 * 1024 * 1024,
            cors_enabled: true,
        }
    }
}

/// Routing engine settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SingBoxConfig {
    /// Supervisor unit name.
    pub service_name: String,

    /// Checker binary, tried after supervisor introspection.
    pub binary_path: Option<PathBuf>,

    /// Primary configuration file.
    pub config_path: PathBuf,

    /// Tried in order when the primary file does not exist.
    pub fallback_paths: Vec<PathBuf>,

    /// Upper bound for any external command, in seconds.
    pub command_timeout_secs: u64,

    /// Run the checker before rule-set writes.
    pub validate_rule_sets: bool,

    /// Take a sibling backup before every mutation commit.
    pub backup_before_write: bool,
}

impl Default for SingBoxConfig {
    fn default() -> Self {
        Self {
            service_name: "sing-box".to_string(),
            binary_path: None,
            config_path: PathBuf::from("/etc/sing-box/config.json"),
            fallback_paths: vec![
                PathBuf::from("config.json"),
                PathBuf::from("./config/sing-box.json"),
                PathBuf::from("./bin/test/config.json"),
            ],
            command_timeout_secs: 30,
            validate_rule_sets: true,
            backup_before_write: false,
        }
    }
}

impl SingBoxConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// DNS proxy settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DnsConfig {
    pub service_name: String,
    pub config_path: PathBuf,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            service_name: "mosdns".to_string(),
            config_path: PathBuf::from("/etc/mosdns/config.yaml"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackupConfig {
    /// Where raw configuration saves put their backups.
    pub dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./backups"),
        }
    }
}

/// Delays used by the restart job.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RollbackConfig {
    /// Wait before restarting, so the response reaches the client.
    pub flush_delay_secs: u64,

    /// Wait after restarting before checking the service status.
    pub verify_delay_secs: u64,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            flush_delay_secs: 2,
            verify_delay_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
