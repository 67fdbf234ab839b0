// src/handlers/health.rs

use axum::{Json, response::IntoResponse};

/// Liveness check.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
