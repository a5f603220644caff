use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{TopPath, Visit};
use crate::storage::Storage;

const MAX_LIMIT: i64 = 500;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_top_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

fn default_top_limit() -> i64 {
    10
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_LIMIT)
}

fn internal_error(context: &str, err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %err, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("{context}: {err}"),
        }),
    )
}

/// List recorded visits, newest first
pub async fn list_visits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Visit>>, (StatusCode, Json<ErrorResponse>)> {
    state
        .storage
        .list(clamp_limit(query.limit), query.offset.max(0))
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to list visits", e))
}

/// Pages with the most views
pub async fn top_paths(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Vec<TopPath>>, (StatusCode, Json<ErrorResponse>)> {
    state
        .storage
        .top_paths(clamp_limit(query.limit))
        .await
        .map(Json)
        .map_err(|e| internal_error("Failed to load top paths", e))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
