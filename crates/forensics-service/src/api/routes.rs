use crate::error::ApiError;
use crate::state::ForensicsServiceState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use common::analysis::AnalysisConfig;
use common::history::HistoryListResponse;
use common::queue::{EnqueueRequest, QueueListResponse};
use serde_json::json;

/// Health check endpoint
pub async fn healthz(State(state): State<ForensicsServiceState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "forensics-service",
            "node_id": state.node_id(),
        })),
    )
}

/// Readiness check endpoint
pub async fn readyz(State(state): State<ForensicsServiceState>) -> impl IntoResponse {
    let classifier = state.classifier();
    match classifier.health_check().await {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "classifier": classifier.id(),
            })),
        ),
        Ok(false) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "classifier": classifier.id(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "classifier": classifier.id(),
                "error": e.to_string(),
            })),
        ),
    }
}

/// Prometheus metrics endpoint
pub async fn metrics() -> impl IntoResponse {
    match telemetry::metrics::encode_metrics() {
        Ok(body) => body.into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// List queued items in submission order
pub async fn list_items(State(state): State<ForensicsServiceState>) -> impl IntoResponse {
    Json(QueueListResponse {
        items: state.queue().list(),
    })
}

/// Add an item to the queue
pub async fn enqueue_item(
    State(state): State<ForensicsServiceState>,
    Json(request): Json<EnqueueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.queue().enqueue(request)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Remove every item, cancelling running sessions
pub async fn clear_items(State(state): State<ForensicsServiceState>) -> impl IntoResponse {
    let removed = state.queue().clear();
    Json(json!({ "removed": removed }))
}

pub async fn get_item(
    State(state): State<ForensicsServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .queue()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("queue item {} not found", id)))
}

/// Remove one item, cancelling its session if running
pub async fn remove_item(
    State(state): State<ForensicsServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.queue().remove(&id)?;
    Ok(Json(item))
}

/// Start (or retry) analysis of one item in the background
pub async fn run_item(
    State(state): State<ForensicsServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.start_item(&id)?;
    Ok((StatusCode::ACCEPTED, Json(item)))
}

/// Start every eligible item in the background
pub async fn run_batch(State(state): State<ForensicsServiceState>) -> impl IntoResponse {
    let started = state.start_batch();
    (StatusCode::ACCEPTED, Json(json!({ "started": started })))
}

pub async fn get_settings(State(state): State<ForensicsServiceState>) -> impl IntoResponse {
    Json(state.settings().await.as_ref().clone())
}

/// Replace the live analysis settings
pub async fn update_settings(
    State(state): State<ForensicsServiceState>,
    Json(settings): Json<AnalysisConfig>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state
        .update_settings(settings)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(settings.as_ref().clone()))
}

/// Finalized results, newest first
pub async fn list_history(
    State(state): State<ForensicsServiceState>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.history().list().await?;
    Ok(Json(HistoryListResponse { entries }))
}

pub async fn clear_history(
    State(state): State<ForensicsServiceState>,
) -> Result<impl IntoResponse, ApiError> {
    state.history().clear().await?;
    Ok(StatusCode::NO_CONTENT)
}
