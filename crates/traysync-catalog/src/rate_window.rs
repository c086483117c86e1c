//! Fixed-window request budget for the catalog API.
//!
//! The catalog allows a fixed number of requests per minute and answers 429
//! once the budget is spent. [`RateWindow`] paces requests client-side so the
//! budget is normally never hit; the 429 path in [`crate::retry`] is the
//! fallback when it is.
//!
//! This is a fixed window, not a sliding one: up to `2 * budget` requests can
//! land inside any one `window`-long span that straddles a window boundary.

use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_RATE_BUDGET: u32 = 120;
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_millis(60_000);

/// Counts requests issued in the current window.
///
/// One instance per run. Not shared across runs or tasks; the fetch loop owns
/// it and mutates it from a single sequential path.
#[derive(Debug)]
pub struct RateWindow {
    budget: u32,
    window: Duration,
    count: u32,
    window_start: Instant,
}

impl RateWindow {
    /// Creates a window starting now.
    ///
    /// A `budget` of zero is raised to one so the limiter can always make
    /// progress.
    #[must_use]
    pub fn new(budget: u32, window: Duration) -> Self {
        Self::starting_at(budget, window, Instant::now())
    }

    #[must_use]
    pub fn starting_at(budget: u32, window: Duration, window_start: Instant) -> Self {
        Self {
            budget: budget.max(1),
            window,
            count: 0,
            window_start,
        }
    }

    /// Claims one request slot, returning how long the caller must wait
    /// first. A zero duration means the slot was granted.
    ///
    /// A non-zero wait does *not* claim a slot: the caller sleeps for the
    /// returned duration and calls `reserve` again.
    pub fn reserve(&mut self) -> Duration {
        self.reserve_at(Instant::now())
    }

    /// [`Self::reserve`] against an explicit clock reading.
    pub fn reserve_at(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window {
            tracing::debug!(
                previous_count = self.count,
                "rate window elapsed, starting a new window"
            );
            self.count = 0;
            self.window_start = now;
        }

        if self.count < self.budget {
            self.count += 1;
            return Duration::ZERO;
        }

        self.window.saturating_sub(now.saturating_duration_since(self.window_start))
    }

    /// Waits (as often as needed) until a slot is granted.
    pub async fn acquire(&mut self) {
        loop {
            let wait = self.reserve();
            if wait.is_zero() {
                return;
            }
            tracing::info!(
                budget = self.budget,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "request budget for this window spent; pausing"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests granted in the current window.
    #[must_use]
    pub fn used(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn budget(&self) -> u32 {
        self.budget
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_BUDGET, DEFAULT_RATE_WINDOW)
    }
}
