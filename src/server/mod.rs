mod routes;
mod state;

use crate::core::models::{CONTRIBUTIONS_PATH, NOW_PLAYING_PATH};
use crate::core::settings::{Secrets, Settings};
use crate::providers::WidgetSource;
use anyhow::{Context, Result};
use axum::handler::Handler;
use axum::http::header::ORIGIN;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

pub use state::AppState;

use routes::{contributions_handler, method_not_allowed, now_playing_handler};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = contributions_cors(&state.allowed_origins);

    Router::new()
        .route(
            NOW_PLAYING_PATH,
            get(now_playing_handler).fallback(method_not_allowed),
        )
        .route(
            CONTRIBUTIONS_PATH,
            get(contributions_handler.layer(cors)).fallback(method_not_allowed),
        )
        .with_state(state)
}

/// Reflects `Origin` only for allow-listed origins. Wraps the GET handler
/// alone so other methods still reach the 405 fallback.
fn contributions_cors(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring allowed origin that is not a valid header value");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
        .vary([ORIGIN])
}

/// Binds the HTTP server and runs it until Ctrl+C or SIGTERM.
pub async fn serve(settings: &Settings, secrets: &Secrets, bind: Option<String>) -> Result<()> {
    let state = AppState::new(settings, secrets)?;

    warn_if_unconfigured(&state.spotify, NOW_PLAYING_PATH);
    warn_if_unconfigured(&state.github, CONTRIBUTIONS_PATH);

    let address = bind.unwrap_or_else(|| settings.server.bind.clone());
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(address = %listener.local_addr()?, "Server running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

fn warn_if_unconfigured(source: &impl WidgetSource, path: &str) {
    if !source.has_credentials() {
        tracing::warn!(
            source = source.name(),
            path,
            hint = source.credential_hint(),
            "Credentials missing, endpoint will answer 500"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
