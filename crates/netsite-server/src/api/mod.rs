//! API module for the Netsite server
//!
//! Routes and handlers; all topology logic lives in `TopologyService`.

use axum::{
    routing::{get, post},
    Router,
};
use netsite_core::TopologyService;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod access;
pub mod errors;
pub mod health;
pub mod topology;

/// Shared handler state
pub struct AppState {
    /// Topology operations
    pub service: TopologyService,
    /// `memory` or `postgres`, reported by the health check
    pub store_kind: &'static str,
}

/// Build the router for API endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Site topology
        .route(
            "/v1/sites/:site/topology/draft",
            get(topology::get_draft_handler).put(topology::save_draft_handler),
        )
        .route("/v1/sites/:site/topology/publish", post(topology::publish_handler))
        .route("/v1/sites/:site/topology/published", get(topology::get_published_handler))
        .route("/v1/sites/:site/topology/state", get(topology::get_state_handler))
        .route("/v1/sites/:site/topology/projection", get(topology::get_projection_handler))
        // Outage analysis
        .route("/v1/topology/alternates", post(topology::alternates_handler))
        // Health check
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
