//! Process-global request rate limiter shared across all callers.
//!
//! A bounded timestamp deque under a mutex: on each request, evict
//! timestamps older than the window, sleep until the oldest one ages out
//! if the bucket is full, then record a new timestamp. The sleep is a
//! cooperative wait tied to the control loop's cancellation token rather
//! than a bare thread sleep, so shutdown isn't blocked behind it.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const RATE_MAX: usize = 100;
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    timestamps: Mutex<VecDeque<Instant>>,
    max: usize,
    window: Duration,
}

/// Outcome of waiting for a rate-limiter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Acquired,
    Cancelled,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self { timestamps: Mutex::new(VecDeque::with_capacity(max)), max, window }
    }

    pub fn shared() -> Self {
        Self::new(RATE_MAX, RATE_WINDOW)
    }

    /// Blocks (cooperatively) until a slot opens, or returns
    /// [`Admission::Cancelled`] immediately if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Admission {
        loop {
            let wait_until = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();
                let cutoff = now - self.window;
                while matches!(timestamps.front(), Some(t) if *t < cutoff) {
                    timestamps.pop_front();
                }

                if timestamps.len() < self.max {
                    timestamps.push_back(now);
                    return Admission::Acquired;
                }

                *timestamps.front().unwrap() + self.window
            };

            tokio::select! {
                _ = tokio::time::sleep_until(wait_until) => continue,
                _ = cancel.cancelled() => return Admission::Cancelled,
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.timestamps.lock().await.len()
    }
}
