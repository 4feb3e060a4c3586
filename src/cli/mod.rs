//! One-shot commands that call an upstream directly, without the server.

pub mod contributions;
pub mod now_playing;

use crate::providers::WidgetSource;
use anyhow::{Context, Result};
use serde::Serialize;

async fn fetch_source<S: WidgetSource>(source: &S) -> Result<S::Output> {
    if !source.has_credentials() {
        anyhow::bail!(
            "{} is not configured. {}",
            source.name(),
            source.credential_hint()
        );
    }

    source
        .fetch()
        .await
        .with_context(|| format!("Failed to fetch from {}", source.name()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
