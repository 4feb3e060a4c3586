use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub spotify: SpotifySettings,
    pub github: GithubSettings,
    pub polling: PollingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    pub token_url: String,
    pub now_playing_url: String,
    pub timeout_ms: u64,
    pub token_expiry_buffer_secs: u64,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            now_playing_url: "https://api.spotify.com/v1/me/player/currently-playing"
                .to_string(),
            timeout_ms: 5000,
            token_expiry_buffer_secs: 60,
        }
    }
}

impl SpotifySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn expiry_buffer(&self) -> Duration {
        Duration::from_secs(self.token_expiry_buffer_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub username: String,
    pub graphql_url: String,
    pub timeout_ms: u64,
    pub cache_ttl_secs: u64,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            username: "caleb-kan".to_string(),
            graphql_url: "https://api.github.com/graphql".to_string(),
            timeout_ms: 5000,
            cache_ttl_secs: 60,
        }
    }
}

impl GithubSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub base_url: String,
    pub active_interval_ms: u64,
    pub idle_interval_ms: u64,
    pub calendar_interval_secs: u64,
    pub request_timeout_ms: u64,
    pub max_consecutive_errors: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            active_interval_ms: 1000,
            idle_interval_ms: 5000,
            calendar_interval_secs: 60,
            request_timeout_ms: 5000,
            max_consecutive_errors: 3,
        }
    }
}

impl PollingSettings {
    pub fn active_interval(&self) -> Duration {
        Duration::from_millis(self.active_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn calendar_interval(&self) -> Duration {
        Duration::from_secs(self.calendar_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("homepage-widgets").join("config.toml"))
    }

    /// Loads from `path`, or from the default config location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path().context("Could not determine config directory")?,
        };

        if !path.exists() {
            tracing::info!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.validate()?;
        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.spotify.timeout_ms == 0
            || self.github.timeout_ms == 0
            || self.polling.request_timeout_ms == 0
        {
            anyhow::bail!("timeout_ms must be greater than zero");
        }
        if self.polling.active_interval_ms == 0
            || self.polling.idle_interval_ms == 0
            || self.polling.calendar_interval_secs == 0
        {
            anyhow::bail!("polling intervals must be greater than zero");
        }
        if self.server.allowed_origins.iter().any(|o| o == "*") {
            anyhow::bail!("server.allowed_origins must list origins explicitly, not \"*\"");
        }
        if self.polling.max_consecutive_errors == 0 {
            anyhow::bail!("polling.max_consecutive_errors must be at least 1");
        }
        Ok(())
    }
}

/// Upstream credentials. Read from the process environment only, never from
/// the config file.
#[derive(Clone, Default)]
pub struct Secrets {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_refresh_token: Option<String>,
    pub github_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            spotify_client_id: env_secret("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: env_secret("SPOTIFY_CLIENT_SECRET"),
            spotify_refresh_token: env_secret("SPOTIFY_REFRESH_TOKEN"),
            github_token: env_secret("GITHUB_TOKEN"),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("spotify_client_id", &self.spotify_client_id.is_some())
            .field("spotify_client_secret", &self.spotify_client_secret.is_some())
            .field("spotify_refresh_token", &self.spotify_refresh_token.is_some())
            .field("github_token", &self.github_token.is_some())
            .finish()
    }
}

fn env_secret(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let value = value.trim();
    if value.is_empty() {
        tracing::warn!(key, "Secret is set but empty");
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind, "127.0.0.1:3000");
        assert_eq!(settings.spotify.timeout(), Duration::from_secs(5));
        assert_eq!(settings.spotify.expiry_buffer(), Duration::from_secs(60));
        assert_eq!(settings.github.cache_ttl(), Duration::from_secs(60));
        assert_eq!(settings.polling.active_interval(), Duration::from_millis(1000));
        assert_eq!(settings.polling.idle_interval(), Duration::from_millis(5000));
        assert_eq!(settings.polling.calendar_interval(), Duration::from_secs(60));
        assert_eq!(settings.polling.max_consecutive_errors, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.polling.idle_interval_ms = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.spotify.timeout_ms = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.polling.max_consecutive_errors = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.server.allowed_origins.push("*".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [server]
            allowed_origins = ["https://example.com"]

            [github]
            username = "octocat"
            cache_ttl_secs = 600

            [polling]
            active_interval_ms = 2000
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.server.bind, "127.0.0.1:3000");
        assert_eq!(settings.server.allowed_origins, vec!["https://example.com"]);
        assert_eq!(settings.github.username, "octocat");
        assert_eq!(settings.github.cache_ttl(), Duration::from_secs(600));
        assert_eq!(settings.polling.active_interval_ms, 2000);
        assert_eq!(settings.polling.idle_interval_ms, 5000);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.github.username, "caleb-kan");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[polling]\ncalendar_interval_secs = 0\n").unwrap();
        assert!(Settings::load(Some(&path)).is_err());

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
    }

    #[test]
    fn test_secrets_debug_hides_values() {
        let secrets = Secrets {
            github_token: Some("ghp_secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("github_token: true"));
    }
}
