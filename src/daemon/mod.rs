pub mod polling;
pub mod widgets;

use crate::core::settings::Settings;
use crate::providers::http_client;
use crate::ui::{TerminalCalendar, TerminalCard};
use anyhow::{Context, Result};
use polling::{follow_visibility, PollScheduler, Visibility};
use tokio::sync::watch;
use tokio::task::JoinSet;
use widgets::{CalendarWidget, NowPlayingWidget};

/// Polls the running server and renders the widgets to the terminal until
/// Ctrl+C. On unix, SIGUSR1 toggles visibility the way a hidden browser tab
/// would.
pub async fn run(settings: &Settings, now_playing: bool, calendar: bool) -> Result<()> {
    if !now_playing && !calendar {
        anyhow::bail!("Nothing to watch: both widgets are disabled");
    }

    let client = http_client().context("Failed to build HTTP client")?;
    let (visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);
    let mut followers = JoinSet::new();

    if now_playing {
        let widget = NowPlayingWidget::new(client.clone(), &settings.polling, TerminalCard);
        followers.spawn(follow_visibility(
            PollScheduler::new(widget),
            visibility_rx.clone(),
        ));
    }
    if calendar {
        let widget = CalendarWidget::new(client, &settings.polling, TerminalCalendar);
        followers.spawn(follow_visibility(
            PollScheduler::new(widget),
            visibility_rx.clone(),
        ));
    }
    drop(visibility_rx);

    tracing::info!(
        base_url = %settings.polling.base_url,
        now_playing,
        calendar,
        "Watching widgets"
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            tracing::info!("Received Ctrl+C, stopping");
        }
        result = toggle_on_sigusr1(&visibility_tx) => result?,
    }

    // Closing the channel stops every scheduler.
    drop(visibility_tx);
    while let Some(joined) = followers.join_next().await {
        joined.context("Widget task panicked")?;
    }
    Ok(())
}

#[cfg(unix)]
async fn toggle_on_sigusr1(visibility: &watch::Sender<Visibility>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigusr1 =
        signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
    while sigusr1.recv().await.is_some() {
        visibility.send_modify(|v| {
            *v = match *v {
                Visibility::Visible => Visibility::Hidden,
                Visibility::Hidden => Visibility::Visible,
            }
        });
        tracing::info!(visibility = ?*visibility.borrow(), "Visibility toggled");
    }
    Ok(())
}

#[cfg(not(unix))]
async fn toggle_on_sigusr1(_visibility: &watch::Sender<Visibility>) -> Result<()> {
    std::future::pending().await
}
