use std::time::Duration;
use thiserror::Error;

/// Failures of the upstream proxies. Handlers log these and answer with a
/// generic body, so the messages are for the server log only.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("missing configuration: {0}")]
    Config(&'static str),

    #[error("{upstream} did not answer within {timeout:?}")]
    UpstreamTimeout {
        upstream: &'static str,
        timeout: Duration,
    },

    #[error("{upstream} returned HTTP {status}")]
    UpstreamHttp { upstream: &'static str, status: u16 },

    #[error("{upstream} rejected the credential exchange: {reason}")]
    UpstreamAuth {
        upstream: &'static str,
        reason: String,
    },

    #[error("{upstream} request failed: {message}")]
    Transport {
        upstream: &'static str,
        message: String,
    },

    #[error("{upstream} returned an unexpected payload: {reason}")]
    Payload {
        upstream: &'static str,
        reason: String,
    },
}

impl WidgetError {
    pub fn is_config(&self) -> bool {
        matches!(self, WidgetError::Config(_))
    }

    /// Errors worth retrying on the next poll rather than treating as fatal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WidgetError::UpstreamTimeout { .. }
                | WidgetError::UpstreamHttp { .. }
                | WidgetError::Transport { .. }
        )
    }
}
