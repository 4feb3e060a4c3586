use super::state::AppState;
use crate::core::models::NowPlayingSnapshot;
use axum::extract::State;
use axum::http::header::{ALLOW, CACHE_CONTROL};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

const NO_STORE: &str = "no-cache, no-store, must-revalidate";

/// `GET /api/now-playing`
///
/// Missing credentials are a server misconfiguration and answer 500. Every
/// other upstream failure answers 200 with `isPlaying: false`.
pub async fn now_playing_handler(State(state): State<Arc<AppState>>) -> Response {
    let (status, snapshot) = match state.spotify.fetch_now_playing().await {
        Ok(snapshot) => (StatusCode::OK, snapshot),
        Err(e) if e.is_config() => {
            error!(error = %e, "Spotify credentials are not configured");
            (StatusCode::INTERNAL_SERVER_ERROR, NowPlayingSnapshot::not_playing())
        }
        Err(e) => {
            warn!(error = %e, "Spotify lookup failed, reporting not playing");
            (StatusCode::OK, NowPlayingSnapshot::not_playing())
        }
    };

    (status, [(CACHE_CONTROL, NO_STORE)], Json(snapshot)).into_response()
}

/// `GET /api/github-contributions`. CORS headers come from the layer the
/// router wraps this handler in.
pub async fn contributions_handler(State(state): State<Arc<AppState>>) -> Response {
    let cache_control = format!(
        "public, max-age=0, s-maxage={}, stale-while-revalidate=60",
        state.github.cache_ttl().as_secs()
    );

    match state.github.fetch_contributions().await {
        Ok(data) => (
            StatusCode::OK,
            [(CACHE_CONTROL, cache_control)],
            Json(data),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to fetch contributions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CACHE_CONTROL, cache_control)],
                Json(json!({ "error": "Failed to fetch contributions" })),
            )
                .into_response()
        }
    }
}

/// Any method other than GET on a known path.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, "GET")],
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}
