// src/handlers/session.rs

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::utils::session_id::generate_session_id;

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Mints a session id for a player that has none stored locally.
pub async fn create_session() -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(json!({ "session_id": generate_session_id() })),
    )
}
