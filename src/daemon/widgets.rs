use crate::core::error::WidgetError;
use crate::core::http::call_with_deadline;
use crate::core::models::{
    Contributions, NowPlayingSnapshot, CONTRIBUTIONS_PATH, NOW_PLAYING_PATH,
};
use crate::core::retry::ErrorStreak;
use crate::core::settings::PollingSettings;
use crate::daemon::polling::PollCycle;
use crate::ui::{CalendarRenderer, NowPlayingCard, NowPlayingRenderer};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    timeout: Duration,
    endpoint: &'static str,
) -> Result<T, WidgetError> {
    let response = call_with_deadline(client.get(url), timeout)
        .await
        .into_result(endpoint)?;
    response.json().await.map_err(|e| WidgetError::Payload {
        upstream: endpoint,
        reason: e.to_string(),
    })
}

/// Polls the now-playing endpoint. Polls fast while the card is shown and
/// slowly while it is hidden.
pub struct NowPlayingWidget<R: NowPlayingRenderer> {
    client: Client,
    url: String,
    timeout: Duration,
    active_interval: Duration,
    idle_interval: Duration,
    errors: ErrorStreak,
    card: NowPlayingCard,
    renderer: R,
}

impl<R: NowPlayingRenderer> NowPlayingWidget<R> {
    pub fn new(client: Client, settings: &PollingSettings, renderer: R) -> Self {
        Self {
            client,
            url: format!("{}{}", settings.base_url.trim_end_matches('/'), NOW_PLAYING_PATH),
            timeout: settings.request_timeout(),
            active_interval: settings.active_interval(),
            idle_interval: settings.idle_interval(),
            errors: ErrorStreak::new(settings.max_consecutive_errors),
            card: NowPlayingCard::new(),
            renderer,
        }
    }

    /// `None` means a transient failure: keep whatever is on screen.
    async fn fetch(&mut self) -> Option<NowPlayingSnapshot> {
        match get_json(&self.client, &self.url, self.timeout, "now-playing endpoint").await {
            Ok(snapshot) => {
                if self.errors.is_failing() {
                    tracing::info!(
                        after = self.errors.consecutive_failures(),
                        "Now-playing endpoint recovered"
                    );
                }
                self.errors.record_success();
                Some(snapshot)
            }
            Err(e) => {
                self.errors.record_failure();
                if e.is_transient() {
                    tracing::warn!(
                        error = %e,
                        consecutive_failures = self.errors.consecutive_failures(),
                        "Now-playing poll failed"
                    );
                } else {
                    tracing::error!(error = %e, "Now-playing endpoint returned an unusable response");
                }
                self.errors
                    .is_tripped()
                    .then(NowPlayingSnapshot::not_playing)
            }
        }
    }

    #[allow(dead_code)]
    pub fn is_card_visible(&self) -> bool {
        self.card.is_visible()
    }

    #[allow(dead_code)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

#[async_trait]
impl<R: NowPlayingRenderer> PollCycle for NowPlayingWidget<R> {
    async fn run(&mut self) -> Duration {
        match self.fetch().await {
            Some(snapshot) if snapshot.is_playing => {
                let update = self.card.show(&snapshot, self.active_interval);
                self.renderer.show(&snapshot, &update);
            }
            Some(_) => {
                if self.card.hide() {
                    self.renderer.hide();
                }
            }
            None => {}
        }

        if self.card.is_visible() {
            self.active_interval
        } else {
            self.idle_interval
        }
    }
}

/// Polls the contributions endpoint on a fixed period and keeps the last
/// good calendar when a poll fails.
pub struct CalendarWidget<R: CalendarRenderer> {
    client: Client,
    url: String,
    timeout: Duration,
    interval: Duration,
    last: Option<Contributions>,
    renderer: R,
}

impl<R: CalendarRenderer> CalendarWidget<R> {
    pub fn new(client: Client, settings: &PollingSettings, renderer: R) -> Self {
        Self {
            client,
            url: format!("{}{}", settings.base_url.trim_end_matches('/'), CONTRIBUTIONS_PATH),
            timeout: settings.request_timeout(),
            interval: settings.calendar_interval(),
            last: None,
            renderer,
        }
    }

    #[allow(dead_code)]
    pub fn last(&self) -> Option<&Contributions> {
        self.last.as_ref()
    }

    #[allow(dead_code)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

#[async_trait]
impl<R: CalendarRenderer> PollCycle for CalendarWidget<R> {
    async fn run(&mut self) -> Duration {
        let polled = get_json::<Contributions>(
            &self.client,
            &self.url,
            self.timeout,
            "contributions endpoint",
        )
        .await;
        match polled {
            Ok(data) => {
                if self.last.as_ref() != Some(&data) {
                    self.renderer.render(&data);
                }
                self.last = Some(data);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Contributions poll failed, keeping last calendar");
            }
        }
        self.interval
    }
}
