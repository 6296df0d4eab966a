use crate::deployment::{apply_initial_deployment_policy, make_deployment};
use crate::error::Error;
use crate::resources::DeploymentConfig;
use crate::state::{AppState, RequestContext};
use crate::store::{ConfigStore, RepositoryStore};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, http::StatusCode, routing::get};
use k8s_openapi::api::core::v1::ReplicationController;
use serde_json::json;
use tracing::{error, warn};

pub async fn readiness_probe() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn liveness_probe() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub fn create_app<C, R>(state: AppState<C, R>) -> Router
where
    C: ConfigStore + 'static,
    R: RepositoryStore + 'static,
{
    Router::new()
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route(
            "/deploymentconfigs/{name}/generate",
            get(generate_in_default_namespace::<C, R>),
        )
        .route(
            "/namespaces/{namespace}/deploymentconfigs/{name}/generate",
            get(generate::<C, R>),
        )
        .route(
            "/namespaces/{namespace}/deploymentconfigs/{name}/deployment",
            get(deployment::<C, R>),
        )
        .with_state(state)
}

/// Returns the next version of the deployment config. Nothing is persisted.
pub async fn generate<C, R>(
    State(state): State<AppState<C, R>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<DeploymentConfig>, ApiError>
where
    C: ConfigStore,
    R: RepositoryStore,
{
    let ctx = RequestContext::new(namespace, state.shutdown.child_token());
    let config = state.generator.generate(&ctx, &name).await?;
    Ok(Json(config))
}

pub async fn generate_in_default_namespace<C, R>(
    State(state): State<AppState<C, R>>,
    Path(name): Path<String>,
) -> Result<Json<DeploymentConfig>, ApiError>
where
    C: ConfigStore,
    R: RepositoryStore,
{
    let namespace = state.default_namespace.clone();
    generate(State(state), Path((namespace, name))).await
}

/// Returns the replication controller that would deploy the next version of the deployment config.
/// A never deployed config is previewed as its first deployment.
pub async fn deployment<C, R>(
    State(state): State<AppState<C, R>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ReplicationController>, ApiError>
where
    C: ConfigStore,
    R: RepositoryStore,
{
    let ctx = RequestContext::new(namespace, state.shutdown.child_token());
    let config = apply_initial_deployment_policy(state.generator.generate(&ctx, &name).await?);
    Ok(Json(make_deployment(&config)?))
}

#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(Error::Store(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidSpec(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Generation failed: {:?}", self.0);
        } else {
            warn!("Generation failed: {}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
