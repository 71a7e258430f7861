//! Control API tests

use std::collections::BTreeMap;
use std::sync::Arc;

use api_models::{ErrorResponse, HealthResponse, RepoSummary};
use axum::body::{to_bytes, Body};
use axum::Router;
use deployd::deploy::fsm::DeploymentStatus;
use deployd::models::deployment::Deployment;
use deployd::server::serve::router;
use deployd::server::state::ServerState;
use http::{Request, StatusCode};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use crate::common::{fetch, options, wait_until_settled, Harness};

fn app(harness: &Harness) -> Router {
    router(Arc::new(ServerState::new(harness.registry().clone())))
}

async fn call<T: DeserializeOwned>(app: Router, request: Request<Body>) -> (StatusCode, T) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 23000)).await;

    let (status, health): (_, HealthResponse) = call(app(&harness), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.status, "healthy");
    assert_eq!(health.service, "deployd");

    harness.stop().await;
}

#[tokio::test]
async fn test_deploy_then_list() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 23100)).await;

    let (status, created): (_, Deployment) = call(
        app(&harness),
        post_json(
            "/api/deploy",
            serde_json::json!({
                "project_name": "site",
                "files": {
                    "index.html": "<h1>hi</h1>",
                    "favicon.ico": {"base64": "AAEC"}
                },
                "github_repo": null
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created.project_name, "site");
    assert_eq!(created.port, 23100);

    let (status, listed): (_, BTreeMap<String, Deployment>) =
        call(app(&harness), get("/api/deployments")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed.contains_key(&created.id));

    let live = wait_until_settled(harness.registry(), &created.id).await;
    assert_eq!(live.status, DeploymentStatus::Live);
    let icon = fetch(live.port, "/favicon.ico").await.bytes().await.unwrap();
    assert_eq!(icon.as_ref(), &[0u8, 1, 2]);

    harness.stop().await;
}

#[tokio::test]
async fn test_deploy_validation_errors() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 23200)).await;

    let (status, error): (_, ErrorResponse) = call(
        app(&harness),
        post_json("/api/deploy", serde_json::json!({"project_name": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error.error.contains("project_name"));

    let (status, _): (_, ErrorResponse) = call(
        app(&harness),
        post_json(
            "/api/deploy",
            serde_json::json!({"project_name": "x", "files": {"../up.html": "x"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, error): (_, ErrorResponse) = call(
        app(&harness),
        post_json(
            "/api/deploy",
            serde_json::json!({
                "project_name": "x",
                "files": {"a.bin": {"base64": "not base64!"}}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error.error.contains("a.bin"));

    let (status, _): (_, ErrorResponse) = call(
        app(&harness),
        post_json("/api/deploy", serde_json::json!(["not", "an", "object"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(harness.registry().get_all().await.is_empty());
    harness.stop().await;
}

#[tokio::test]
async fn test_get_deployment_by_id() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 23400)).await;

    let created = harness.registry().create("site", None, None).await.unwrap();
    wait_until_settled(harness.registry(), &created.id).await;

    let (status, found): (_, Deployment) = call(
        app(&harness),
        get(&format!("/api/deployments/{}", created.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.id, created.id);
    assert_eq!(found.status, DeploymentStatus::Live);

    let (status, error): (_, ErrorResponse) =
        call(app(&harness), get("/api/deployments/missing0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error.error.contains("missing0"));

    harness.stop().await;
}

#[tokio::test]
async fn test_list_repos() {
    let temp = tempfile::tempdir().unwrap();
    let harness = Harness::start(&options(temp.path(), 23300)).await;

    let (status, repos): (_, Vec<RepoSummary>) =
        call(app(&harness), get("/api/github/repos?username=octo")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repos.len(), 4);
    assert_eq!(repos[0].name, "my-website");

    let (status, _): (_, ErrorResponse) =
        call(app(&harness), get("/api/github/repos")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    harness.stop().await;
}
