use crate::core::error::WidgetError;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// Result of a single bounded upstream call.
#[derive(Debug)]
pub enum CallOutcome {
    Ok(Response),
    TimedOut(Duration),
    HttpError(StatusCode),
    Transport(reqwest::Error),
}

/// Sends `request`, aborting it once `deadline` has elapsed. Any status
/// of 400 or above comes back as `HttpError`.
pub async fn call_with_deadline(request: RequestBuilder, deadline: Duration) -> CallOutcome {
    match request.timeout(deadline).send().await {
        Ok(response) if response.status().as_u16() >= 400 => {
            CallOutcome::HttpError(response.status())
        }
        Ok(response) => CallOutcome::Ok(response),
        Err(e) if e.is_timeout() => CallOutcome::TimedOut(deadline),
        Err(e) => CallOutcome::Transport(e),
    }
}

impl CallOutcome {
    pub fn into_result(self, upstream: &'static str) -> Result<Response, WidgetError> {
        match self {
            CallOutcome::Ok(response) => Ok(response),
            CallOutcome::TimedOut(timeout) => Err(WidgetError::UpstreamTimeout { upstream, timeout }),
            CallOutcome::HttpError(status) => Err(WidgetError::UpstreamHttp {
                upstream,
                status: status.as_u16(),
            }),
            CallOutcome::Transport(e) => Err(WidgetError::Transport {
                upstream,
                message: e.to_string(),
            }),
        }
    }
}
