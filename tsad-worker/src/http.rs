//! The worker's `/detector` HTTP surface (§6 "Worker HTTP (JSON)").

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tsad_core::source::Source;
use tsad_core::TaskConfig;
use tsad_detector::DetectorError;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/submit_task", post(submit_task))
        .route("/submit_batch_tasks", post(submit_batch_tasks))
        .route("/cancel_task", post(cancel_task))
        .route("/retrain_task", post(retrain_task))
        .route("/forecast_task", post(forecast_task))
        .route("/query_task_detail", get(query_task_detail))
        .route("/all_task_detail", get(all_task_detail))
        .route("/all_ts_detail", get(all_ts_detail))
        .route("/summary", get(summary))
        .with_state(state)
}

struct ApiError(DetectorError);

impl From<DetectorError> for ApiError {
    fn from(error: DetectorError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            DetectorError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            DetectorError::AdmissionDenied | DetectorError::ArgumentInvalid(_) => StatusCode::BAD_REQUEST,
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
    state
        .detector
        .submit_task(req.name, req.data_source, TaskConfig::parse(&req.config))
        .await?;
    Ok(StatusCode::OK)
}

async fn submit_batch_tasks(
    State(state): State<Arc<AppState>>,
    Json(reqs): Json<Vec<SubmitTaskRequest>>,
) -> Json<Vec<String>> {
    let batch = reqs
        .into_iter()
        .map(|r| (r.name, r.data_source, TaskConfig::parse(&r.config)))
        .collect();

    let results = state.detector.submit_batch(batch).await;
    Json(results.into_iter().map(|r| r.map(|_| "ok".to_string()).unwrap_or_else(|e| e)).collect())
}

#[derive(Debug, Deserialize)]
struct NameRequest {
    name: String,
}

async fn cancel_task(State(state): State<Arc<AppState>>, Json(req): Json<NameRequest>) -> ApiResult<StatusCode> {
    state.detector.cancel_task(&req.name)?;
    Ok(StatusCode::OK)
}

async fn retrain_task(State(state): State<Arc<AppState>>, Json(req): Json<NameRequest>) -> ApiResult<StatusCode> {
    state.detector.retrain_task(&req.name).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct ForecastRequest {
    name: String,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
}

async fn forecast_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForecastRequest>,
) -> ApiResult<impl IntoResponse> {
    let results = tsad_detector::forecast_task(&state.detector, &state.ctx, &req.name, req.begin, req.end).await?;
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
struct NameQuery {
    name: String,
}

async fn query_task_detail(State(state): State<Arc<AppState>>, Query(q): Query<NameQuery>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.detector.query_task_detail(&q.name)?))
}

async fn all_task_detail(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.detector.all_task_detail())
}

async fn all_ts_detail(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.detector.all_ts_detail())
}

async fn summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.detector.summary())
}
