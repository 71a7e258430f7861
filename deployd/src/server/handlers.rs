//! HTTP request handlers

use std::sync::Arc;

use api_models::{
    CreateDeploymentRequest, ErrorResponse, HealthResponse, RepoQuery, VersionResponse,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::errors::PlatformError;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error returned by API handlers
pub struct ApiError(PlatformError);

impl From<PlatformError> for ApiError {
    fn from(err: PlatformError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PlatformError::ValidationError(_) => StatusCode::BAD_REQUEST,
            PlatformError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployd".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// List every deployment keyed by id
pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    Json(state.registry.get_all().await)
}

/// Get a single deployment
pub async fn get_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deployment = state
        .registry
        .get(&id)
        .await
        .ok_or_else(|| PlatformError::NotFound(format!("deployment {}", id)))?;
    Ok(Json(deployment))
}

/// Create a deployment
pub async fn create_deployment_handler(
    State(state): State<Arc<ServerState>>,
    request: Result<Json<CreateDeploymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // Malformed bodies are caller errors like any other validation failure
    let Json(request) =
        request.map_err(|rejection| PlatformError::ValidationError(rejection.body_text()))?;
    let deployment = state
        .registry
        .create(&request.project_name, request.files, request.github_repo)
        .await?;
    Ok(Json(deployment))
}

/// List repositories for a GitHub user
pub async fn list_repos_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RepoQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let repos = state.registry.list_repos(&query.username).await?;
    Ok(Json(repos))
}
