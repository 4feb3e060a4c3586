//! Drift-corrected polling.
//!
//! A [`PollScheduler`] repeatedly runs a [`PollCycle`] (fetch, then render).
//! Each cycle reports the interval that fits its current state, and the next
//! cycle is armed `interval - elapsed` after the previous one *started*, so
//! slow fetches do not stretch the cadence. At most one cycle is in flight at
//! any time; a tick that finds one running is dropped, not queued.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;

#[async_trait]
pub trait PollCycle: Send + 'static {
    /// Runs one fetch-then-render pass and returns the interval to wait,
    /// measured from the start of this pass, before the next one.
    async fn run(&mut self) -> Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

struct ArmedTimer {
    id: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct PollState {
    is_active: bool,
    in_flight: bool,
    next_timer_id: u64,
    timer: Option<ArmedTimer>,
}

impl PollState {
    /// Stores the pending timer and returns the id that owns the slot.
    fn arm(&mut self, handle: AbortHandle) -> u64 {
        self.next_timer_id += 1;
        let id = self.next_timer_id;
        self.timer = Some(ArmedTimer { id, handle });
        id
    }

    /// Clears the slot only while it still holds timer `id`. A restart can
    /// arm a newer timer before an older driver wakes up.
    fn disarm(&mut self, id: u64) {
        if self.timer.as_ref().is_some_and(|timer| timer.id == id) {
            self.timer = None;
        }
    }
}

struct Shared<C> {
    state: Mutex<PollState>,
    cycle: tokio::sync::Mutex<C>,
}

impl<C> Shared<C> {
    fn state(&self) -> MutexGuard<'_, PollState> {
        // A panic while holding this lock cannot leave the flags half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct PollScheduler<C: PollCycle> {
    shared: Arc<Shared<C>>,
}

impl<C: PollCycle> Clone for PollScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Wait before the next cycle given how long the last one took.
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

impl<C: PollCycle> PollScheduler<C> {
    pub fn new(cycle: C) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PollState::default()),
                cycle: tokio::sync::Mutex::new(cycle),
            }),
        }
    }

    /// Activates polling and runs a cycle right away. No-op when active.
    pub fn start(&self) {
        {
            let mut state = self.shared.state();
            if state.is_active {
                return;
            }
            state.is_active = true;
        }
        tracing::debug!("Polling started");
        tokio::spawn(drive(Arc::clone(&self.shared)));
    }

    /// Deactivates polling and disarms the pending timer. A cycle already in
    /// flight finishes but does not schedule another.
    pub fn stop(&self) {
        let mut state = self.shared.state();
        state.is_active = false;
        if let Some(timer) = state.timer.take() {
            timer.handle.abort();
        }
        tracing::debug!(in_flight = state.in_flight, "Polling stopped");
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        match visibility {
            Visibility::Visible => self.start(),
            Visibility::Hidden => self.stop(),
        }
    }

    #[allow(dead_code)]
    pub fn is_active(&self) -> bool {
        self.shared.state().is_active
    }

    #[allow(dead_code)]
    pub fn is_in_flight(&self) -> bool {
        self.shared.state().in_flight
    }

    #[allow(dead_code)]
    pub fn has_timer(&self) -> bool {
        self.shared.state().timer.is_some()
    }
}

/// Ties the scheduler's lifecycle to a visibility signal until the sender
/// goes away, then stops it.
pub async fn follow_visibility<C: PollCycle>(
    scheduler: PollScheduler<C>,
    mut visibility: watch::Receiver<Visibility>,
) {
    loop {
        let current = *visibility.borrow_and_update();
        scheduler.set_visibility(current);
        if visibility.changed().await.is_err() {
            break;
        }
    }
    scheduler.stop();
}

async fn drive<C: PollCycle>(shared: Arc<Shared<C>>) {
    loop {
        {
            let mut state = shared.state();
            if !state.is_active || state.in_flight {
                return;
            }
            state.in_flight = true;
        }

        let started = Instant::now();
        let interval = shared.cycle.lock().await.run().await;

        let (sleeper, timer_id) = {
            let mut state = shared.state();
            state.in_flight = false;
            if !state.is_active {
                return;
            }
            let delay = next_delay(interval, started.elapsed());
            tracing::trace!(delay_ms = delay.as_millis() as u64, "Next poll armed");
            let sleeper = tokio::spawn(tokio::time::sleep(delay));
            let timer_id = state.arm(sleeper.abort_handle());
            (sleeper, timer_id)
        };

        if sleeper.await.is_err() {
            return;
        }
        shared.state().disarm(timer_id);
    }
}
