use crate::core::cache::CachedValue;
use crate::core::error::WidgetError;
use crate::core::http::{call_with_deadline, CallOutcome};
use crate::core::models::{NowPlayingSnapshot, UNKNOWN};
use crate::core::settings::{Secrets, SpotifySettings};
use crate::providers::WidgetSource;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

const UPSTREAM: &str = "spotify";
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    name: Option<String>,
    #[serde(default)]
    artists: Vec<Artist>,
    album: Option<Album>,
    external_urls: Option<ExternalUrls>,
    duration_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Album {
    name: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

struct ClientCredentials<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
}

/// Cached Spotify access token, refreshed from the long-lived refresh token.
pub struct TokenCache {
    client: Client,
    token_url: String,
    secrets: Secrets,
    timeout: Duration,
    expiry_buffer: Duration,
    // Held across the exchange so concurrent callers share one refresh.
    slot: Mutex<Option<CachedValue<String>>>,
}

impl TokenCache {
    pub fn new(client: Client, settings: &SpotifySettings, secrets: &Secrets) -> Self {
        Self {
            client,
            token_url: settings.token_url.clone(),
            secrets: secrets.clone(),
            timeout: settings.timeout(),
            expiry_buffer: settings.expiry_buffer(),
            slot: Mutex::new(None),
        }
    }

    fn credentials(&self) -> Result<ClientCredentials<'_>, WidgetError> {
        Ok(ClientCredentials {
            client_id: self
                .secrets
                .spotify_client_id
                .as_deref()
                .ok_or(WidgetError::Config("SPOTIFY_CLIENT_ID"))?,
            client_secret: self
                .secrets
                .spotify_client_secret
                .as_deref()
                .ok_or(WidgetError::Config("SPOTIFY_CLIENT_SECRET"))?,
            refresh_token: self
                .secrets
                .spotify_refresh_token
                .as_deref()
                .ok_or(WidgetError::Config("SPOTIFY_REFRESH_TOKEN"))?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    pub async fn get_access_token(&self) -> Result<String, WidgetError> {
        let credentials = self.credentials()?;

        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref().and_then(|c| c.fresh()) {
            return Ok(token.clone());
        }

        let (token, ttl) = self.exchange(&credentials).await?;
        tracing::debug!(ttl_secs = ttl.as_secs(), "Refreshed Spotify access token");
        *slot = Some(CachedValue::new(token.clone(), ttl));
        Ok(token)
    }

    /// Drops the cached token if it is still `rejected`. A token another
    /// caller already refreshed is kept.
    pub async fn invalidate_if(&self, rejected: &str) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|cached| cached.value() == rejected) {
            *slot = None;
        }
    }

    async fn exchange(
        &self,
        credentials: &ClientCredentials<'_>,
    ) -> Result<(String, Duration), WidgetError> {
        let basic = STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));

        let request = self
            .client
            .post(&self.token_url)
            .header(AUTHORIZATION, format!("Basic {basic}"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token),
            ]);

        let response = match call_with_deadline(request, self.timeout).await {
            CallOutcome::HttpError(status) => {
                return Err(WidgetError::UpstreamAuth {
                    upstream: UPSTREAM,
                    reason: format!("token endpoint returned HTTP {}", status.as_u16()),
                });
            }
            other => other.into_result(UPSTREAM)?,
        };

        let body: TokenResponse = response.json().await.map_err(|e| WidgetError::UpstreamAuth {
            upstream: UPSTREAM,
            reason: format!("unreadable token response: {e}"),
        })?;

        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WidgetError::UpstreamAuth {
                upstream: UPSTREAM,
                reason: "no access token in response".to_string(),
            })?;

        Ok((token, credential_ttl(body.expires_in, self.expiry_buffer)))
    }
}

/// Lifetime to cache a token for, backed off by `buffer` so a token is
/// never used right at its expiry.
fn credential_ttl(expires_in: Option<i64>, buffer: Duration) -> Duration {
    let secs = expires_in
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    Duration::from_secs(secs as u64).saturating_sub(buffer)
}

pub struct SpotifyClient {
    client: Client,
    now_playing_url: String,
    timeout: Duration,
    tokens: TokenCache,
}

impl SpotifyClient {
    pub fn new(client: Client, settings: &SpotifySettings, secrets: &Secrets) -> Self {
        Self {
            tokens: TokenCache::new(client.clone(), settings, secrets),
            client,
            now_playing_url: settings.now_playing_url.clone(),
            timeout: settings.timeout(),
        }
    }

    /// Current playback state. Upstream failures other than configuration
    /// and credential exchange come back as "not playing".
    pub async fn fetch_now_playing(&self) -> Result<NowPlayingSnapshot, WidgetError> {
        let token = self.tokens.get_access_token().await?;
        let mut outcome = self.request_now_playing(&token).await;

        if matches!(outcome, CallOutcome::HttpError(s) if s == StatusCode::UNAUTHORIZED) {
            tracing::info!("Spotify rejected the access token, refreshing once");
            self.tokens.invalidate_if(&token).await;
            let token = self.tokens.get_access_token().await?;
            outcome = self.request_now_playing(&token).await;
        }

        let response = match outcome.into_result(UPSTREAM) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Spotify now-playing request failed");
                return Ok(NowPlayingSnapshot::not_playing());
            }
        };

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(NowPlayingSnapshot::not_playing());
        }

        match response.json::<CurrentlyPlaying>().await {
            Ok(body) => Ok(snapshot_from(body)),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable Spotify now-playing body");
                Ok(NowPlayingSnapshot::not_playing())
            }
        }
    }

    async fn request_now_playing(&self, token: &str) -> CallOutcome {
        let request = self
            .client
            .get(&self.now_playing_url)
            .header(AUTHORIZATION, format!("Bearer {token}"));
        call_with_deadline(request, self.timeout).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn snapshot_from(body: CurrentlyPlaying) -> NowPlayingSnapshot {
    let Some(item) = body.item else {
        return NowPlayingSnapshot::not_playing();
    };

    let artist = item
        .artists
        .into_iter()
        .filter_map(|a| non_empty(a.name))
        .collect::<Vec<_>>()
        .join(", ");
    let (album, album_art) = match item.album {
        Some(album) => (
            non_empty(album.name),
            album.images.into_iter().next().and_then(|i| non_empty(i.url)),
        ),
        None => (None, None),
    };

    NowPlayingSnapshot {
        is_playing: body.is_playing,
        title: Some(non_empty(item.name).unwrap_or_else(|| UNKNOWN.to_string())),
        artist: Some(non_empty(Some(artist)).unwrap_or_else(|| UNKNOWN.to_string())),
        album: Some(album.unwrap_or_else(|| UNKNOWN.to_string())),
        album_art: Some(album_art.unwrap_or_default()),
        song_url: Some(
            item.external_urls
                .and_then(|u| non_empty(u.spotify))
                .unwrap_or_default(),
        ),
        progress: Some(body.progress_ms.unwrap_or(0)),
        duration: Some(item.duration_ms.unwrap_or(0)),
    }
}

#[async_trait]
impl WidgetSource for SpotifyClient {
    type Output = NowPlayingSnapshot;

    fn name(&self) -> &'static str {
        "Spotify"
    }

    async fn fetch(&self) -> Result<NowPlayingSnapshot, WidgetError> {
        self.fetch_now_playing().await
    }

    fn has_credentials(&self) -> bool {
        self.tokens.is_configured()
    }

    fn credential_hint(&self) -> &'static str {
        "Set SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REFRESH_TOKEN"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::testing::spawn_upstream;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone)]
    struct MockSpotify {
        token_calls: Arc<AtomicUsize>,
        data_calls: Arc<AtomicUsize>,
        token_status: Arc<AtomicU16>,
        token_body: Arc<StdMutex<Option<serde_json::Value>>>,
        data_script: Arc<StdMutex<VecDeque<(u16, serde_json::Value)>>>,
        seen_auth: Arc<StdMutex<Vec<String>>>,
    }

    impl MockSpotify {
        fn new() -> Self {
            Self {
                token_calls: Arc::new(AtomicUsize::new(0)),
                data_calls: Arc::new(AtomicUsize::new(0)),
                token_status: Arc::new(AtomicU16::new(200)),
                token_body: Arc::new(StdMutex::new(None)),
                data_script: Arc::new(StdMutex::new(VecDeque::new())),
                seen_auth: Arc::new(StdMutex::new(Vec::new())),
            }
        }

        fn script(&self, status: u16, body: serde_json::Value) {
            self.data_script.lock().unwrap().push_back((status, body));
        }

        fn token_calls(&self) -> usize {
            self.token_calls.load(Ordering::SeqCst)
        }

        fn data_calls(&self) -> usize {
            self.data_calls.load(Ordering::SeqCst)
        }
    }

    async fn token_handler(
        State(mock): State<MockSpotify>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> Response {
        let n = mock.token_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let expected = format!("Basic {}", STANDARD.encode("id:secret"));
        assert_eq!(headers.get("authorization").unwrap(), expected.as_str());
        assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
        assert_eq!(form.get("refresh_token").map(String::as_str), Some("refresh"));

        let status = mock.token_status.load(Ordering::SeqCst);
        if status != 200 {
            return AxumStatus::from_u16(status).unwrap().into_response();
        }
        let body = mock
            .token_body
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| serde_json::json!({ "access_token": format!("T{n}"), "expires_in": 3600 }));
        Json(body).into_response()
    }

    async fn data_handler(State(mock): State<MockSpotify>, headers: HeaderMap) -> Response {
        mock.data_calls.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        mock.seen_auth.lock().unwrap().push(auth);

        let next = mock.data_script.lock().unwrap().pop_front();
        match next {
            Some((200, body)) => Json(body).into_response(),
            Some((status, _)) => AxumStatus::from_u16(status).unwrap().into_response(),
            None => AxumStatus::NO_CONTENT.into_response(),
        }
    }

    fn secrets() -> Secrets {
        Secrets {
            spotify_client_id: Some("id".to_string()),
            spotify_client_secret: Some("secret".to_string()),
            spotify_refresh_token: Some("refresh".to_string()),
            github_token: None,
        }
    }

    async fn client_for(mock: &MockSpotify, secrets: Secrets) -> SpotifyClient {
        let router = Router::new()
            .route("/api/token", post(token_handler))
            .route("/v1/me/player/currently-playing", get(data_handler))
            .with_state(mock.clone());
        let base = spawn_upstream(router).await;

        let settings = SpotifySettings {
            token_url: format!("{base}/api/token"),
            now_playing_url: format!("{base}/v1/me/player/currently-playing"),
            ..SpotifySettings::default()
        };
        SpotifyClient::new(Client::new(), &settings, &secrets)
    }

    fn song_a() -> serde_json::Value {
        serde_json::json!({
            "is_playing": true,
            "progress_ms": 50000,
            "item": {
                "name": "Song A",
                "artists": [{ "name": "Artist A" }],
                "duration_ms": 200000
            }
        })
    }

    #[tokio::test]
    async fn test_end_to_end_now_playing() {
        let mock = MockSpotify::new();
        *mock.token_body.lock().unwrap() =
            Some(serde_json::json!({ "access_token": "T1", "expires_in": 3600 }));
        mock.script(200, song_a());
        let spotify = client_for(&mock, secrets()).await;

        let snapshot = spotify.fetch_now_playing().await.unwrap();

        assert!(snapshot.is_playing);
        assert_eq!(snapshot.title.as_deref(), Some("Song A"));
        assert_eq!(snapshot.artist.as_deref(), Some("Artist A"));
        assert_eq!(snapshot.progress, Some(50_000));
        assert_eq!(snapshot.duration, Some(200_000));
        assert_eq!(snapshot.album.as_deref(), Some("Unknown"));
        assert_eq!(snapshot.album_art.as_deref(), Some(""));
        assert_eq!(snapshot.song_url.as_deref(), Some(""));
        assert_eq!(mock.seen_auth.lock().unwrap().as_slice(), ["Bearer T1"]);
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let mock = MockSpotify::new();
        mock.script(200, song_a());
        mock.script(200, song_a());
        let spotify = client_for(&mock, secrets()).await;

        spotify.fetch_now_playing().await.unwrap();
        spotify.fetch_now_playing().await.unwrap();

        assert_eq!(mock.token_calls(), 1);
        assert_eq!(mock.data_calls(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_and_retries_once() {
        let mock = MockSpotify::new();
        mock.script(401, serde_json::Value::Null);
        mock.script(200, song_a());
        let spotify = client_for(&mock, secrets()).await;

        let snapshot = spotify.fetch_now_playing().await.unwrap();

        assert!(snapshot.is_playing);
        assert_eq!(mock.token_calls(), 2);
        assert_eq!(mock.data_calls(), 2);
        assert_eq!(
            mock.seen_auth.lock().unwrap().as_slice(),
            ["Bearer T1", "Bearer T2"]
        );
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_not_retried() {
        let mock = MockSpotify::new();
        mock.script(401, serde_json::Value::Null);
        mock.script(401, serde_json::Value::Null);
        mock.script(200, song_a());
        let spotify = client_for(&mock, secrets()).await;

        let snapshot = spotify.fetch_now_playing().await.unwrap();

        assert_eq!(snapshot, NowPlayingSnapshot::not_playing());
        assert_eq!(mock.token_calls(), 2);
        assert_eq!(mock.data_calls(), 2);
    }

    #[tokio::test]
    async fn test_status_mapping_to_not_playing() {
        for status in [204, 404, 500] {
            let mock = MockSpotify::new();
            mock.script(status, serde_json::Value::Null);
            let spotify = client_for(&mock, secrets()).await;

            let snapshot = spotify.fetch_now_playing().await.unwrap();
            assert_eq!(snapshot, NowPlayingSnapshot::not_playing(), "status {status}");
            assert_eq!(mock.data_calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_missing_item_is_not_playing() {
        let mock = MockSpotify::new();
        mock.script(200, serde_json::json!({ "is_playing": true, "item": null }));
        let spotify = client_for(&mock, secrets()).await;

        let snapshot = spotify.fetch_now_playing().await.unwrap();
        assert!(!snapshot.is_playing);
        assert!(snapshot.title.is_none());
    }

    #[tokio::test]
    async fn test_missing_secret_fails_before_network() {
        let mock = MockSpotify::new();
        let mut secrets = secrets();
        secrets.spotify_client_secret = None;
        let spotify = client_for(&mock, secrets).await;

        let err = spotify.fetch_now_playing().await.unwrap_err();
        assert!(matches!(err, WidgetError::Config("SPOTIFY_CLIENT_SECRET")));
        assert!(!spotify.has_credentials());
        assert_eq!(mock.token_calls(), 0);
        assert_eq!(mock.data_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_auth_error() {
        let mock = MockSpotify::new();
        mock.token_status.store(400, Ordering::SeqCst);
        let spotify = client_for(&mock, secrets()).await;

        let err = spotify.fetch_now_playing().await.unwrap_err();
        assert!(matches!(err, WidgetError::UpstreamAuth { .. }));
        assert_eq!(mock.data_calls(), 0);
    }

    #[tokio::test]
    async fn test_exchange_without_token_is_auth_error() {
        let mock = MockSpotify::new();
        *mock.token_body.lock().unwrap() = Some(serde_json::json!({ "expires_in": 3600 }));
        let spotify = client_for(&mock, secrets()).await;

        let err = spotify.tokens.get_access_token().await.unwrap_err();
        assert!(matches!(err, WidgetError::UpstreamAuth { .. }));
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_exchange() {
        let mock = MockSpotify::new();
        let spotify = client_for(&mock, secrets()).await;

        assert_eq!(spotify.tokens.get_access_token().await.unwrap(), "T1");
        assert_eq!(spotify.tokens.get_access_token().await.unwrap(), "T1");

        spotify.tokens.invalidate_if("T0").await;
        assert_eq!(spotify.tokens.get_access_token().await.unwrap(), "T1");

        spotify.tokens.invalidate_if("T1").await;
        assert_eq!(spotify.tokens.get_access_token().await.unwrap(), "T2");
        assert_eq!(mock.token_calls(), 2);
    }

    /// Answers 401 to `Bearer T1` after a delay, so concurrent callers all
    /// see the rejection before either refreshes.
    async fn slow_reject_t1_handler(
        State(mock): State<MockSpotify>,
        headers: HeaderMap,
    ) -> Response {
        mock.data_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        if headers.get("authorization").is_some_and(|v| v == "Bearer T1") {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        Json(song_a()).into_response()
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_share_one_refresh() {
        let mock = MockSpotify::new();
        let router = Router::new()
            .route("/api/token", post(token_handler))
            .route("/v1/me/player/currently-playing", get(slow_reject_t1_handler))
            .with_state(mock.clone());
        let base = spawn_upstream(router).await;
        let settings = SpotifySettings {
            token_url: format!("{base}/api/token"),
            now_playing_url: format!("{base}/v1/me/player/currently-playing"),
            ..SpotifySettings::default()
        };
        let spotify = SpotifyClient::new(Client::new(), &settings, &secrets());

        let (a, b) = tokio::join!(spotify.fetch_now_playing(), spotify.fetch_now_playing());

        assert!(a.unwrap().is_playing);
        assert!(b.unwrap().is_playing);
        assert_eq!(mock.token_calls(), 2);
        assert_eq!(mock.data_calls(), 4);
    }

    #[tokio::test]
    async fn test_token_exchange_timeout() {
        let mock = MockSpotify::new();
        let router = Router::new()
            .route(
                "/api/token",
                post(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(serde_json::json!({ "access_token": "late" }))
                }),
            )
            .route("/v1/me/player/currently-playing", get(data_handler))
            .with_state(mock.clone());
        let base = spawn_upstream(router).await;
        let settings = SpotifySettings {
            token_url: format!("{base}/api/token"),
            now_playing_url: format!("{base}/v1/me/player/currently-playing"),
            timeout_ms: 100,
            ..SpotifySettings::default()
        };
        let spotify = SpotifyClient::new(Client::new(), &settings, &secrets());

        let err = spotify.fetch_now_playing().await.unwrap_err();
        assert!(matches!(err, WidgetError::UpstreamTimeout { .. }));
        assert_eq!(mock.data_calls(), 0);
    }

    #[test]
    fn test_credential_ttl_applies_buffer() {
        let buffer = Duration::from_secs(60);
        assert_eq!(credential_ttl(Some(3600), buffer), Duration::from_secs(3540));
        assert_eq!(credential_ttl(None, buffer), Duration::from_secs(3540));
        assert_eq!(credential_ttl(Some(0), buffer), Duration::from_secs(3540));
        assert_eq!(credential_ttl(Some(30), buffer), Duration::ZERO);
    }

    #[test]
    fn test_snapshot_defaults_and_joins_artists() {
        let body: CurrentlyPlaying = serde_json::from_value(serde_json::json!({
            "is_playing": false,
            "item": {
                "name": "",
                "artists": [{ "name": "A" }, { "name": "B" }],
                "album": { "name": "Album", "images": [{ "url": "https://img/1" }, { "url": "https://img/2" }] },
                "external_urls": { "spotify": "https://open.spotify.com/track/x" }
            }
        }))
        .unwrap();

        let snapshot = snapshot_from(body);
        assert!(!snapshot.is_playing);
        assert_eq!(snapshot.title.as_deref(), Some("Unknown"));
        assert_eq!(snapshot.artist.as_deref(), Some("A, B"));
        assert_eq!(snapshot.album.as_deref(), Some("Album"));
        assert_eq!(snapshot.album_art.as_deref(), Some("https://img/1"));
        assert_eq!(
            snapshot.song_url.as_deref(),
            Some("https://open.spotify.com/track/x")
        );
        assert_eq!(snapshot.progress, Some(0));
        assert_eq!(snapshot.duration, Some(0));
    }
}
