//! The manager's control-plane HTTP surface (§6 "Manager HTTP (JSON)").

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tsad_client::WorkerClient;
use tsad_core::source::Source;

use crate::control_plane::ControlPlaneError;
use crate::{detail, AppState};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/submit_task", post(submit_task))
        .route("/update_task", post(update_task))
        .route("/stop_task", post(stop_task))
        .route("/start_task", post(start_task))
        .route("/retrain_task", post(retrain_task))
        .route("/forecast_task", post(forecast_task))
        .route("/query_task_detail", get(query_task_detail))
        .route("/all_task_detail", get(all_task_detail))
        .route("/summary", get(summary))
        .with_state(state)
}

struct ApiError(ControlPlaneError);

impl From<ControlPlaneError> for ApiError {
    fn from(error: ControlPlaneError) -> Self {
        Self(error)
    }
}

impl From<tsad_store::StoreError> for ApiError {
    fn from(error: tsad_store::StoreError) -> Self {
        Self(ControlPlaneError::Store(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            ControlPlaneError::Store(tsad_store::StoreError::TaskNotFound(_)) => StatusCode::NOT_FOUND,
            ControlPlaneError::Store(tsad_store::StoreError::TaskExists(_)) => StatusCode::CONFLICT,
            ControlPlaneError::NotStopped(_) | ControlPlaneError::ArgumentInvalid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct SubmitTaskRequest {
    name: String,
    data_source: Source,
    config: String,
}

async fn submit_task(State(state): State<Arc<AppState>>, Json(req): Json<SubmitTaskRequest>) -> ApiResult<StatusCode> {
    state.control_plane.submit(req.name, req.data_source, req.config).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    old_name: String,
    new_name: String,
    data_source: Source,
    config: String,
}

async fn update_task(State(state): State<Arc<AppState>>, Json(req): Json<UpdateTaskRequest>) -> ApiResult<StatusCode> {
    state
        .control_plane
        .update(&req.old_name, &req.new_name, req.data_source, req.config)
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct NameRequest {
    name: String,
}

async fn stop_task(State(state): State<Arc<AppState>>, Json(req): Json<NameRequest>) -> ApiResult<StatusCode> {
    state.control_plane.stop(&req.name).await?;
    Ok(StatusCode::OK)
}

async fn start_task(State(state): State<Arc<AppState>>, Json(req): Json<NameRequest>) -> ApiResult<StatusCode> {
    state.control_plane.start(&req.name).await?;
    Ok(StatusCode::OK)
}

async fn retrain_task(State(state): State<Arc<AppState>>, Json(req): Json<NameRequest>) -> ApiResult<StatusCode> {
    state.control_plane.retrain(&req.name).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct ForecastRequest {
    name: String,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Rejects intervals longer than 15 days or an inverted range before ever
/// reaching the owning worker (§6).
async fn forecast_task(State(state): State<Arc<AppState>>, Json(req): Json<ForecastRequest>) -> ApiResult<impl IntoResponse> {
    if req.begin > req.end {
        return Err(ApiError(ControlPlaneError::ArgumentInvalid(format!("begin {:?} is after end {:?}", req.begin, req.end))));
    }
    if req.end - req.begin > chrono::Duration::days(15) {
        return Err(ApiError(ControlPlaneError::ArgumentInvalid("forecast interval exceeds 15 days".to_string())));
    }

    let record = state.control_plane.get(&req.name).await?;
    if record.owner.is_empty() {
        return Err(ApiError(ControlPlaneError::ArgumentInvalid(format!("task {:?} has no owner yet", req.name))));
    }

    let client = WorkerClient::new(format!("http://{}:{}", record.owner, state.worker_port));
    let forecast = client
        .forecast_task(&req.name, req.begin, req.end)
        .await
        .map_err(ControlPlaneError::Worker)?;
    Ok(Json(forecast))
}

#[derive(Debug, Deserialize)]
struct NameQuery {
    name: String,
}

async fn query_task_detail(State(state): State<Arc<AppState>>, Query(q): Query<NameQuery>) -> ApiResult<impl IntoResponse> {
    Ok(Json(detail::query_task_detail(&state.pool, state.worker_port, &q.name).await?))
}

async fn all_task_detail(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(detail::all_task_detail(&state.pool, state.worker_port).await?))
}

async fn summary(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    Ok(Json(detail::summary(&state.pool, state.worker_port).await?))
}
