use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use mockall::mock;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use netsite_core::domain::projection::Projection;
use netsite_core::domain::publish::PublishPlan;
use netsite_core::domain::repository::memory::MemoryTopologyRepository;
use netsite_core::{
    CoreError, Site, SiteId, Snapshot, SnapshotKind, TopologyRepository, TopologyService,
};
use netsite_server::{build_router, AppState};

mock! {
    pub Repo {}

    #[async_trait]
    impl TopologyRepository for Repo {
        async fn find_site(&self, id: &SiteId) -> Result<Option<Site>, CoreError>;
        async fn get_snapshot(&self, id: &SiteId, kind: SnapshotKind) -> Result<Option<Snapshot>, CoreError>;
        async fn save_draft(&self, snapshot: &Snapshot) -> Result<(), CoreError>;
        async fn publish(&self, plan: &PublishPlan) -> Result<(), CoreError>;
        async fn load_projection(&self, id: &SiteId) -> Result<Projection, CoreError>;
    }
}

fn site() -> Site {
    Site::new("17", "AMS1", "Amsterdam")
}

fn app_with(repo: Arc<dyn TopologyRepository>) -> Router {
    build_router(Arc::new(AppState {
        service: TopologyService::new(repo),
        store_kind: "memory",
    }))
}

fn app() -> Router {
    let repo = MemoryTopologyRepository::new();
    repo.register_site(site());
    app_with(Arc::new(repo))
}

fn topology() -> Value {
    json!({
        "nodes": [
            {"id": "AMS1", "label": "Amsterdam", "kind": "core"},
            {"id": "tmp-1", "label": "Rotterdam", "x": 300},
            {"id": "tmp-2", "label": "Utrecht", "x": 300, "y": 200}
        ],
        "edges": [
            {"id": "e1", "source": "AMS1", "target": "tmp-1", "loads": ["DWDM-1"]},
            {"id": "e2", "source": "tmp-1", "target": "tmp-2", "loads": ["dwdm-1 (pass through)"]}
        ],
        "meta": {"zoom": 1.5}
    })
}

fn request(method: &str, uri: &str, access: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(access) = access {
        builder = builder.header("x-topology-access", access).header("x-topology-user", "noc");
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = send(&app(), request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_draft_then_publish() {
    let app = app();

    let (status, _) = send(&app, request("GET", "/v1/sites/17/topology/draft", Some("read"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request("PUT", "/v1/sites/17/topology/draft", Some("write"), Some(topology())),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, draft) = send(&app, request("GET", "/v1/sites/17/topology/draft", Some("read"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(draft["nodes"][1]["id"], "Rotterdam");
    assert!(draft.get("meta").is_none());

    let (_, state) = send(&app, request("GET", "/v1/sites/17/topology/state", None, None)).await;
    assert_eq!(state, json!({"state": "draft_only"}));

    let (status, _) = send(
        &app,
        request("POST", "/v1/sites/17/topology/publish", Some("write"), Some(topology())),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, published) = send(&app, request("GET", "/v1/sites/17/topology/published", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["edges"][1]["source"], "Rotterdam");

    let (_, state) = send(&app, request("GET", "/v1/sites/17/topology/state", None, None)).await;
    assert_eq!(state, json!({"state": "published"}));

    let (status, projection) = send(&app, request("GET", "/v1/sites/17/topology/projection", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(projection["connections"].as_array().map(Vec::len), Some(2));
    assert_eq!(projection["load_tags"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_writes_need_write_access() {
    let app = app();

    let (status, body) = send(
        &app,
        request("PUT", "/v1/sites/17/topology/draft", Some("read"), Some(topology())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_FORBIDDEN");

    let (status, _) = send(&app, request("GET", "/v1/sites/17/topology/draft", None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_publish_is_bad_request() {
    let mut graph = topology();
    graph["edges"][0]["target"] = json!("ghost");

    let (status, body) = send(
        &app(),
        request("POST", "/v1/sites/17/topology/publish", Some("write"), Some(graph)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_VALIDATION_ERROR");
    assert_eq!(body["errorDetails"]["retryable"], false);
}

#[tokio::test]
async fn test_unknown_site_is_not_found() {
    let (status, _) = send(
        &app(),
        request("PUT", "/v1/sites/404/topology/draft", Some("write"), Some(topology())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alternates() {
    let mut body = topology();
    body["offline"] = json!(["e1"]);

    let (status, result) = send(&app(), request("POST", "/v1/topology/alternates", None, Some(body))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        result,
        json!({"e1": {"e2": {"matchingLoad": ["dwdm-1 (pass through)"]}}})
    );
}

#[tokio::test]
async fn test_store_outage_is_retryable() {
    let mut repo = MockRepo::new();
    repo.expect_find_site().returning(|_| Ok(Some(site())));
    repo.expect_publish()
        .returning(|_| Err(CoreError::StateStoreError("deadlock detected".into())));
    let app = app_with(Arc::new(repo));

    let (status, body) = send(
        &app,
        request("POST", "/v1/sites/17/topology/publish", Some("write"), Some(topology())),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_STATE_STORE_UNAVAILABLE");
    assert_eq!(body["errorDetails"]["retryable"], true);
}

#[tokio::test]
async fn test_unreadable_entries_are_dropped_on_save() {
    let app = app();
    let body = json!({
        "nodes": [
            {"id": "AMS1", "kind": "core"},
            {"id": "B"},
            {"id": 42},
            {"id": "C", "x": "10"}
        ],
        "edges": [{"id": "e1", "source": "AMS1", "target": "B", "loads": ["4G"]}]
    });

    let (status, _) = send(&app, request("PUT", "/v1/sites/17/topology/draft", Some("write"), Some(body))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, draft) = send(&app, request("GET", "/v1/sites/17/topology/draft", Some("read"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(draft["nodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(draft["edges"][0]["target"], "B");
}

#[tokio::test]
async fn test_malformed_json_uses_error_body() {
    let req = Request::builder()
        .method("PUT")
        .uri("/v1/sites/17/topology/draft")
        .header("x-topology-access", "write")
        .header("content-type", "application/json")
        .body(Body::from("{\"nodes\": ["))
        .unwrap();

    let (status, body) = send(&app(), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_VALIDATION_ERROR");
}
