//!
//! Netsite Server - HTTP surface over the topology service
//!
//! Wires configuration, logging and the selected topology store into an
//! axum router.

use std::sync::Arc;

use netsite_core::domain::repository::memory::MemoryTopologyRepository;
use netsite_core::{TopologyRepository, TopologyService};
use netsite_state_postgres::PostgresStateStore;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// API module
pub mod api;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

// Re-export key types
pub use api::{build_router, AppState};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};

/// Create the topology repository selected by the configuration
pub async fn create_repository(
    config: &ServerConfig,
) -> ServerResult<(Arc<dyn TopologyRepository>, &'static str)> {
    if config.uses_memory_store() {
        warn!("Using in-memory topology store; data is lost on restart");
        let repo = MemoryTopologyRepository::new();
        for site in &config.seed_sites {
            info!(site_id = %site.id, site_code = %site.code, "Registering seed site");
            repo.register_site(site.clone());
        }
        return Ok((Arc::new(repo), "memory"));
    }

    let store = PostgresStateStore::with_config(config.postgres_config()).await?;
    info!("Using PostgreSQL topology store");
    Ok((store.create_repository(), "postgres"))
}

/// Build the shared handler state
pub async fn create_app_state(config: &ServerConfig) -> ServerResult<Arc<AppState>> {
    let (repo, store_kind) = create_repository(config).await?;
    Ok(Arc::new(AppState {
        service: TopologyService::new(repo),
        store_kind,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run function
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    let state = create_app_state(&config).await?;
    let app = build_router(state);

    let listener = TcpListener::bind((config.bind_address.as_str(), config.port))
        .await
        .map_err(|e| {
            ServerError::ConfigError(format!(
                "Cannot bind {}:{}: {}",
                config.bind_address, config.port, e
            ))
        })?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
