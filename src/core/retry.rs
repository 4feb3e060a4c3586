pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// Consecutive-failure counter for a polling widget. Once the streak runs past
/// the threshold the widget stops holding on to its last state.
#[derive(Debug, Clone)]
pub struct ErrorStreak {
    consecutive_failures: u32,
    threshold: u32,
}

impl ErrorStreak {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_failing(&self) -> bool {
        self.consecutive_failures > 0
    }

    pub fn is_tripped(&self) -> bool {
        self.consecutive_failures > self.threshold
    }
}

impl Default for ErrorStreak {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONSECUTIVE_ERRORS)
    }
}
