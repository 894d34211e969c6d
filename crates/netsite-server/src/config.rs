//! Configuration for the Netsite server
//!
//! Values come from environment variables (optionally seeded from a `.env`
//! file) layered over defaults.

use netsite_core::Site;
use netsite_monitoring::MonitoringConfig;
use netsite_state_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// Postgres URL, or `memory://` for the in-memory store
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Pool size
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    /// Pool acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub database_acquire_timeout_secs: u64,

    /// Apply migrations on startup
    #[serde(default = "default_true")]
    pub database_run_migrations: bool,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// JSON log output
    #[serde(default)]
    pub log_json: bool,

    /// Optional rotated log file
    #[serde(default)]
    pub log_file: Option<String>,

    /// Sites registered in the in-memory store at startup
    #[serde(default)]
    pub seed_sites: Vec<Site>,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_database_url() -> String {
    "memory://".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_log_filter() -> String {
    "info,netsite_core=debug".to_string()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `id:code:name` entries separated by commas
fn parse_seed_sites(value: &str) -> ServerResult<Vec<Site>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(code), Some(name)) if !id.is_empty() && !code.is_empty() => {
                    Ok(Site::new(id, code, name))
                }
                _ => Err(ServerError::ConfigError(format!(
                    "Invalid SEED_SITES entry '{}', expected id:code:name",
                    entry
                ))),
            }
        })
        .collect()
}

impl ServerConfig {
    /// Load configuration from the process environment and `.env`
    pub fn load() -> ServerResult<Self> {
        if dotenv::dotenv().is_ok() {
            info!("Loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.port = port;
            } else {
                warn!("Invalid SERVER_PORT value: {}", port);
            }
        }

        if let Some(host) = lookup("SERVER_HOST") {
            config.bind_address = host;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(max) if max > 0 => config.database_max_connections = max,
                _ => warn!("Invalid DATABASE_MAX_CONNECTIONS value: {}", max),
            }
        }

        if let Some(timeout) = lookup("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                config.database_acquire_timeout_secs = timeout;
            } else {
                warn!("Invalid DATABASE_ACQUIRE_TIMEOUT_SECS value: {}", timeout);
            }
        }

        if let Some(run) = lookup("DATABASE_RUN_MIGRATIONS") {
            match parse_flag(&run) {
                Some(run) => config.database_run_migrations = run,
                None => warn!("Invalid DATABASE_RUN_MIGRATIONS value: {}", run),
            }
        }

        if let Some(filter) = lookup("LOG_FILTER") {
            config.log_filter = filter;
        }

        if let Some(json) = lookup("LOG_JSON") {
            match parse_flag(&json) {
                Some(json) => config.log_json = json,
                None => warn!("Invalid LOG_JSON value: {}", json),
            }
        }

        if let Some(file) = lookup("LOG_FILE").filter(|f| !f.trim().is_empty()) {
            config.log_file = Some(file);
        }

        if let Some(seeds) = lookup("SEED_SITES") {
            config.seed_sites = parse_seed_sites(&seeds)?;
        }

        if config.database_url.trim().is_empty() {
            config.database_url = default_database_url();
        }

        if !config.uses_memory_store() && !config.seed_sites.is_empty() {
            warn!("SEED_SITES is only applied to the in-memory store");
        }

        Ok(config)
    }

    /// Whether the in-memory repository is selected
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }

    /// Pool settings for the Postgres store
    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            connection_string: self.database_url.clone(),
            max_connections: self.database_max_connections,
            acquire_timeout_secs: self.database_acquire_timeout_secs,
            run_migrations: self.database_run_migrations,
        }
    }

    /// Logging settings
    pub fn monitoring_config(&self) -> MonitoringConfig {
        MonitoringConfig {
            service_name: "netsite-server".to_string(),
            log_filter: self.log_filter.clone(),
            enable_json_logging: self.log_json,
            log_file: self.log_file.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            database_acquire_timeout_secs: default_acquire_timeout(),
            database_run_migrations: default_true(),
            log_filter: default_log_filter(),
            log_json: false,
            log_file: None,
            seed_sites: Vec::new(),
        }
    }
}
