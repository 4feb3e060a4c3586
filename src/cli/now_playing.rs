use super::{fetch_source, print_json};
use crate::core::settings::{Secrets, Settings};
use crate::providers::{http_client, SpotifyClient};
use crate::ui::format_line;
use anyhow::Result;

pub async fn run(settings: &Settings, secrets: &Secrets, json: bool) -> Result<()> {
    let spotify = SpotifyClient::new(http_client()?, &settings.spotify, secrets);
    let snapshot = fetch_source(&spotify).await?;

    if json {
        return print_json(&snapshot);
    }

    if snapshot.is_playing {
        println!("{}", format_line(&snapshot, snapshot.progress_percent(), None));
        if let Some(url) = snapshot.song_url.as_deref().filter(|u| !u.is_empty()) {
            println!("  {}", url);
        }
    } else {
        println!("Nothing playing");
    }
    Ok(())
}
