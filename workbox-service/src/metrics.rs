use axum::{extract::State, http::header, response::IntoResponse};

use crate::app_state::AppState;

/// Prometheus text exposition of the service registry.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.gather(),
    )
}
