use crate::models::SuggestionList;
use crate::services::metrics;
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;
use std::time::Instant;

/// `POST /api/suggest`: ask the model for suggestions and relay them.
///
/// Any failure becomes a generic 500; the cause only reaches the logs.
pub async fn suggest(State(state): State<AppState>) -> Result<Json<SuggestionList>, AppError> {
    let start = Instant::now();
    let result = state.suggestions.suggest().await;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(suggestions) => {
            metrics::record_suggest_request("ok", elapsed);
            tracing::info!(count = suggestions.len(), "Served suggestions");
            Ok(Json(suggestions))
        }
        Err(err) => {
            metrics::record_suggest_request(err.outcome(), elapsed);
            Err(err.into())
        }
    }
}
