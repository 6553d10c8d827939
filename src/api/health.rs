//! Liveness endpoint

use axum::{Json, http::StatusCode, response::IntoResponse};

use crate::api::types::HealthResponse;

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::healthy()))
}
