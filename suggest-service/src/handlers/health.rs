use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "suggest-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: the generator must be configured. Does not call upstream.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.suggestions.generator().health_check() {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
