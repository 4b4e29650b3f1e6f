//! Outbound request rate limiting.
//!
//! Bounds how many requests reach the evidence source per time window.
//! Waiters queue on the window lock, so concurrent bursts are served in
//! arrival order without exceeding the budget.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

struct WindowState {
    window_start: Instant,
    used: u32,
}

/// Fixed-window rate limiter.
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` acquisitions per second.
    pub fn new(rate: u32) -> Self {
        Self::with_window(rate, Duration::from_secs(1))
    }

    pub fn with_window(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window: max_per_window.max(1),
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Wait until the current window has budget for another request.
    ///
    /// The window lock is held across the wait, so callers proceed in
    /// the order they arrived.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();
            if now.duration_since(state.window_start) >= self.window {
                state.window_start = now;
                state.used = 0;
            }
            if state.used < self.max_per_window {
                state.used += 1;
                return;
            }
            let next_window = state.window_start + self.window;
            sleep_until(next_window).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    #[tokio::test(start_paused = true)]
    async fn test_within_budget_is_immediate() {
        let limiter = RateLimiter::new(10);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_waits_for_next_window() {
        let limiter = RateLimiter::with_window(2, Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_resets_each_window() {
        let limiter = RateLimiter::with_window(2, Duration::from_secs(1));
        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(1)).await;
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_burst_spans_expected_windows() {
        let limiter = Arc::new(RateLimiter::new(10));
        let start = Instant::now();

        let mut set = JoinSet::new();
        for _ in 0..25 {
            let limiter = limiter.clone();
            set.spawn(async move {
                limiter.acquire().await;
            });
        }
        while set.join_next().await.is_some() {}

        // 25 acquisitions at 10 per window finish two window rollovers in.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
