// Plain HTTP routes: operator status and the highscore proxy.

use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::MatchStateDto;
use crate::interface_adapters::state::AppState;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::warn;

/// Current match lifecycle state, for health checks and lobby browsers.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let current = *state.match_state_tx.borrow();
    Json(MatchStateDto::from(current))
}

/// Proxies the top-ten list from the score backend so clients never need its
/// address.
pub async fn highscores_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(client) = state.highscores.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "highscore backend not configured".to_string(),
            }),
        )
            .into_response();
    };

    match client.get_highscores().await {
        Ok(entries) => Json(entries).into_response(),
        Err(error) => {
            warn!(?error, "highscore fetch failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "highscore backend unavailable".to_string(),
                }),
            )
                .into_response()
        }
    }
}
