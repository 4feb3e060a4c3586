mod github;
mod spotify;

use crate::core::error::WidgetError;
use async_trait::async_trait;
use serde::Serialize;

pub use github::GithubClient;
pub use spotify::SpotifyClient;

const USER_AGENT: &str = concat!("homepage-widgets/", env!("CARGO_PKG_VERSION"));

/// An upstream API proxied by one of the homepage endpoints.
#[async_trait]
pub trait WidgetSource: Send + Sync {
    type Output: Serialize + Send;

    fn name(&self) -> &'static str;
    async fn fetch(&self) -> Result<Self::Output, WidgetError>;
    fn has_credentials(&self) -> bool;
    fn credential_hint(&self) -> &'static str;
}

/// Shared HTTP client for all upstream calls. GitHub rejects requests
/// without a user agent.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}
