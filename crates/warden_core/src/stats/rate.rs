//! # Rate Tracker
//!
//! Counts events inside a fixed, restarting time window.

use std::time::{Duration, Instant};

/// Fixed-window counter.
///
/// The window restarts on the first hit at or after `window` has elapsed
/// since it opened, so the count is "events since the window opened".
#[derive(Clone, Debug)]
pub struct RateTracker {
    /// Window length.
    window: Duration,
    /// When the current window opened.
    window_start: Instant,
    /// Events in the current window.
    count: u32,
}

impl RateTracker {
    /// Creates a tracker whose first window opens at `now`.
    #[must_use]
    pub const fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            window_start: now,
            count: 0,
        }
    }

    /// Records one event and returns the count in the current window.
    pub fn hit(&mut self, now: Instant) -> u32 {
        if now.saturating_duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count = 0;
        }
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Restarts the window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.window_start = now;
        self.count = 0;
    }

    /// Events in the current window.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }
}
