use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNKNOWN: &str = "Unknown";

pub const NOW_PLAYING_PATH: &str = "/api/now-playing";
pub const CONTRIBUTIONS_PATH: &str = "/api/github-contributions";

/// Client-visible shape of `/api/now-playing`. When nothing is playing only
/// `isPlaying` is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingSnapshot {
    pub is_playing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl NowPlayingSnapshot {
    pub fn not_playing() -> Self {
        Self::default()
    }

    /// Stable key for the current track: the song URL when there is one,
    /// otherwise title and artist.
    pub fn track_identity(&self) -> String {
        match self.song_url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!(
                "{}-{}",
                self.title.as_deref().unwrap_or(UNKNOWN),
                self.artist.as_deref().unwrap_or(UNKNOWN)
            ),
        }
    }

    /// Playback position as a percentage of the track, capped at 100.
    pub fn progress_percent(&self) -> f64 {
        let duration = self.duration.unwrap_or(0);
        if duration == 0 {
            return 0.0;
        }
        let progress = self.progress.unwrap_or(0) as f64;
        (progress / duration as f64 * 100.0).min(100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributions {
    pub contributions: Vec<ContributionDay>,
}

impl Contributions {
    pub fn total(&self) -> u64 {
        self.contributions.iter().map(|d| u64::from(d.count)).sum()
    }

    /// Count per date. Input order does not matter; a repeated date keeps
    /// its last count.
    pub fn by_date(&self) -> HashMap<NaiveDate, u32> {
        self.contributions.iter().map(|d| (d.date, d.count)).collect()
    }
}
