//! Rate Limit Module
//!
//! Fixed-window counters. A bucket's limit and window are fixed by the first
//! check made against its key.

use tokio::time::{Duration, Instant};

// == Bucket ==
/// Counter state for one rate-limited key.
#[derive(Debug, Clone)]
pub struct Bucket {
    /// Calls observed in the current window
    pub count: u32,
    /// Threshold fixed on first use
    pub limit: u32,
    /// Window length fixed on first use
    pub window: Duration,
    /// When the current window opened
    pub window_started_at: Instant,
}

impl Bucket {
    // == Constructor ==
    /// Opens a bucket whose first window starts at `now`.
    pub fn new(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            count: 0,
            limit,
            window,
            window_started_at: now,
        }
    }

    /// A window too long to represent as an `Instant` never elapses.
    fn window_elapsed(&self, now: Instant) -> bool {
        self.window_started_at
            .checked_add(self.window)
            .is_some_and(|end| now >= end)
    }

    // == Hit ==
    /// Records one call and reports whether the limit is now reached.
    ///
    /// Crossing a window boundary resets the count before the call is counted.
    pub fn hit(&mut self, now: Instant) -> bool {
        if self.window_elapsed(now) {
            self.count = 0;
            self.window_started_at = now;
        }

        self.count = self.count.saturating_add(1);
        self.count >= self.limit
    }

    /// True if the limit is reached and the window has not yet rolled over.
    pub fn is_limited(&self, now: Instant) -> bool {
        self.count >= self.limit && !self.window_elapsed(now)
    }

    /// Time until the current window closes while limited, else zero.
    pub fn time_remaining(&self, now: Instant) -> Duration {
        if self.is_limited(now) {
            let elapsed = now.saturating_duration_since(self.window_started_at);
            self.window.saturating_sub(elapsed)
        } else {
            Duration::ZERO
        }
    }
}
