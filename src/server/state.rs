use crate::core::settings::{Secrets, Settings};
use crate::providers::{http_client, GithubClient, SpotifyClient};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything the handlers share. One instance per process, so the token
/// cache and the contributions cache are process-wide.
pub struct AppState {
    pub spotify: SpotifyClient,
    pub github: GithubClient,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(settings: &Settings, secrets: &Secrets) -> Result<Arc<Self>> {
        let client = http_client().context("Failed to build HTTP client")?;

        Ok(Arc::new(Self {
            spotify: SpotifyClient::new(client.clone(), &settings.spotify, secrets),
            github: GithubClient::new(client, &settings.github, secrets),
            allowed_origins: settings.server.allowed_origins.clone(),
        }))
    }
}
