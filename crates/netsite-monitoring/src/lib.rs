//! Observability setup shared by Netsite binaries.

use serde::{Deserialize, Serialize};
use tracing::info;

pub mod logging;

pub use logging::{init_logging, LogExt};

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup record
    pub service_name: String,
    /// Log level filter (e.g., "info,netsite_core=debug"), used when
    /// `RUST_LOG` is not set
    pub log_filter: String,
    /// JSON output instead of the human-readable format
    pub enable_json_logging: bool,
    /// Optional file that additionally receives JSON logs, rotated daily
    pub log_file: Option<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "netsite".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
            log_file: None,
        }
    }
}

/// Shutdown hook; flushes nothing yet but marks the end of the log stream
pub fn shutdown(config: &MonitoringConfig) {
    info!(service_name = %config.service_name, "Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MonitoringConfig::default();
        assert_eq!(config.service_name, "netsite");
        assert_eq!(config.log_filter, "info");
        assert!(!config.enable_json_logging);
        assert!(config.log_file.is_none());
    }
}
