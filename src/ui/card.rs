use crate::core::models::{NowPlayingSnapshot, UNKNOWN};
use std::time::Duration;

const BAR_WIDTH: usize = 20;

/// How the card should change for one now-playing update.
#[derive(Debug, Clone, PartialEq)]
pub struct CardUpdate {
    pub new_track: bool,
    /// Where the progress bar is now.
    pub percent: f64,
    /// Where the bar should animate to by the next poll. `None` when paused,
    /// in which case the bar jumps to `percent` and stays there.
    pub target_percent: Option<f64>,
}

/// Visibility and current track of the now-playing card.
#[derive(Debug, Default)]
pub struct NowPlayingCard {
    current_track: Option<String>,
    visible: bool,
}

impl NowPlayingCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn show(&mut self, snapshot: &NowPlayingSnapshot, poll_interval: Duration) -> CardUpdate {
        let identity = snapshot.track_identity();
        let new_track = self.current_track.as_deref() != Some(identity.as_str());
        if new_track {
            self.current_track = Some(identity);
        }
        self.visible = true;

        let duration = snapshot.duration.unwrap_or(0);
        let target_percent = (snapshot.is_playing && duration > 0).then(|| {
            let ahead = snapshot.progress.unwrap_or(0) + poll_interval.as_millis() as u64;
            (ahead.min(duration) as f64 / duration as f64 * 100.0).min(100.0)
        });

        CardUpdate {
            new_track,
            percent: snapshot.progress_percent(),
            target_percent,
        }
    }

    /// Hides the card and forgets the track. Returns whether it was shown.
    pub fn hide(&mut self) -> bool {
        self.current_track = None;
        std::mem::replace(&mut self.visible, false)
    }
}

fn clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn cells(percent: f64) -> usize {
    (((percent / 100.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH)
}

/// Single-line text rendering of a playing track. Cells between `percent`
/// and `target` are drawn as `>` so the line shows where playback will be by
/// the next poll.
pub fn format_line(snapshot: &NowPlayingSnapshot, percent: f64, target: Option<f64>) -> String {
    let filled = cells(percent);
    let ahead = target.map_or(filled, cells).max(filled);
    let bar = format!(
        "{}{}{}",
        "#".repeat(filled),
        ">".repeat(ahead - filled),
        "-".repeat(BAR_WIDTH - ahead)
    );

    format!(
        "{} {} - {} [{}] {} / {}",
        if snapshot.is_playing { "▶" } else { "⏸" },
        snapshot.title.as_deref().unwrap_or(UNKNOWN),
        snapshot.artist.as_deref().unwrap_or(UNKNOWN),
        bar,
        clock(snapshot.progress.unwrap_or(0)),
        clock(snapshot.duration.unwrap_or(0)),
    )
}
