//! Site topology endpoints: draft, publish, published view and outage
//! analysis.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use netsite_core::{Graph, SiteId};
use serde_json::{json, Value};
use std::sync::Arc;

use super::access::RequestAccess;
use super::errors::ApiError;
use super::AppState;

/// Body of draft saves and publishes: the graph plus editor metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyPayload {
    /// Nodes and edges
    pub graph: Graph,
    /// Free-form editor metadata (viewport, notes, ...)
    pub meta: Value,
}

impl TopologyPayload {
    /// Read a request body. Unreadable node or edge entries are dropped
    /// here; a missing or null `meta` becomes `{}`.
    pub fn from_value(body: &Value) -> Self {
        let meta = match body.get("meta") {
            Some(Value::Null) | None => json!({}),
            Some(meta) => meta.clone(),
        };
        Self {
            graph: Graph::from_value(body),
            meta,
        }
    }
}

/// Body of an outage analysis request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlternatesRequest {
    /// Offline edge ids
    pub offline: Vec<String>,
    /// The topology to analyze
    pub graph: Graph,
}

impl AlternatesRequest {
    /// Read a request body; non-string offline ids are ignored
    pub fn from_value(body: &Value) -> Self {
        let offline = body
            .get("offline")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            offline,
            graph: Graph::from_value(body),
        }
    }
}

fn graph_or_no_content(graph: Option<Graph>) -> Response {
    match graph {
        Some(graph) => (StatusCode::OK, Json(graph)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `GET /v1/sites/:site/topology/draft`
pub async fn get_draft_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    RequestAccess(access): RequestAccess,
) -> Result<Response, ApiError> {
    let draft = state.service.get_draft(&SiteId(site), &access).await?;
    Ok(graph_or_no_content(draft))
}

/// `PUT /v1/sites/:site/topology/draft`
pub async fn save_draft_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    RequestAccess(access): RequestAccess,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body?;
    let TopologyPayload { graph, meta } = TopologyPayload::from_value(&body);
    state.service.save_draft(&SiteId(site), graph, meta, &access).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/sites/:site/topology/publish`
pub async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
    RequestAccess(access): RequestAccess,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body?;
    let TopologyPayload { graph, meta } = TopologyPayload::from_value(&body);
    state.service.publish(&SiteId(site), graph, meta, &access).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/sites/:site/topology/published`
pub async fn get_published_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<Response, ApiError> {
    let published = state.service.get_published(&SiteId(site)).await?;
    Ok(graph_or_no_content(published))
}

/// `GET /v1/sites/:site/topology/state`
pub async fn get_state_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let topology_state = state.service.topology_state(&SiteId(site)).await?;
    Ok(Json(json!({ "state": topology_state })))
}

/// `GET /v1/sites/:site/topology/projection`
pub async fn get_projection_handler(
    State(state): State<Arc<AppState>>,
    Path(site): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let projection = state.service.published_projection(&SiteId(site)).await?;
    Ok(Json(projection))
}

/// `POST /v1/topology/alternates`
pub async fn alternates_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let request = AlternatesRequest::from_value(&body);
    Ok(Json(state.service.find_alternates(&request.offline, &request.graph)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults_meta() {
        let payload = TopologyPayload::from_value(&json!({"nodes": [{"id": "A"}], "meta": null}));
        assert_eq!(payload.meta, json!({}));
        assert_eq!(payload.graph.nodes.len(), 1);

        let payload = TopologyPayload::from_value(&json!({"meta": {"zoom": 2}}));
        assert_eq!(payload.meta, json!({"zoom": 2}));
        assert!(payload.graph.is_empty());
    }

    #[test]
    fn test_alternates_request_ignores_odd_offline_ids() {
        let request = AlternatesRequest::from_value(&json!({"offline": ["e1", 7, null, "e2"]}));
        assert_eq!(request.offline, vec!["e1", "e2"]);
    }
}
