//! Structured logging using tracing.
//!
//! Pretty output for development, JSON for log aggregation, plus an
//! optional daily-rotated JSON file.

use anyhow::Context;
use std::path::Path;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::MonitoringConfig;

/// Split a log file path into the rotation directory and file prefix
fn log_file_parts(log_file: &str) -> (&Path, String) {
    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "netsite.log".to_string());
    (dir, prefix)
}

/// Initialize structured logging
pub fn init_logging(config: &MonitoringConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_filter))
            .with_context(|| format!("Invalid log filter '{}'", config.log_filter))?;

    let json_layer = config.enable_json_logging.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let pretty_layer = (!config.enable_json_logging).then(|| {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let file_layer = config.log_file.as_deref().map(|log_file| {
        let (dir, prefix) = log_file_parts(log_file);
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, prefix);
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(file_appender)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to set global default subscriber")?;

    info!(
        service_name = %config.service_name,
        log_format = if config.enable_json_logging { "json" } else { "pretty" },
        log_file = ?config.log_file,
        "Logging initialized"
    );

    Ok(())
}

/// Trait to add log context to results
pub trait LogExt<T, E> {
    /// Log error with additional context before returning
    fn log_err(self, message: &str) -> Result<T, E>;

    /// Log success with additional context before returning
    fn log_ok(self, message: &str) -> Result<T, E>;
}

impl<T, E: std::fmt::Display> LogExt<T, E> for Result<T, E> {
    fn log_err(self, message: &str) -> Result<T, E> {
        if let Err(ref e) = self {
            tracing::error!(error = %e, "{}", message);
        }
        self
    }

    fn log_ok(self, message: &str) -> Result<T, E> {
        if self.is_ok() {
            tracing::info!("{}", message);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_parts() {
        let (dir, prefix) = log_file_parts("/var/log/netsite/server.log");
        assert_eq!(dir, Path::new("/var/log/netsite"));
        assert_eq!(prefix, "server.log");

        let (dir, prefix) = log_file_parts("server.log");
        assert_eq!(dir, Path::new("."));
        assert_eq!(prefix, "server.log");
    }

    #[test]
    fn test_log_ext_passes_results_through() {
        let ok: Result<u32, String> = Ok(3);
        let err: Result<u32, String> = Err("boom".into());

        assert_eq!(ok.log_ok("done").log_err("failed"), Ok(3));
        assert_eq!(err.log_ok("done").log_err("failed"), Err("boom".to_string()));
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        std::env::remove_var("RUST_LOG");
        let config = MonitoringConfig {
            log_filter: "netsite=loud".to_string(),
            ..Default::default()
        };
        assert!(init_logging(&config).is_err());
    }
}
