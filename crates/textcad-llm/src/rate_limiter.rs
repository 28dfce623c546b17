//! Sliding-window admission control for bulk generation

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Default trailing window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Default re-check interval for waiting callers
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Admits at most `max_per_window` callers in any trailing window
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    poll_interval: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `max_per_window` admissions per second
    pub fn new(max_per_window: usize) -> Self {
        Self::with_window(max_per_window, DEFAULT_WINDOW, DEFAULT_POLL_INTERVAL)
    }

    /// Custom window and poll interval. A ceiling of zero is raised to one.
    pub fn with_window(max_per_window: usize, window: Duration, poll_interval: Duration) -> Self {
        Self {
            max_per_window: max_per_window.max(1),
            window,
            poll_interval,
            stamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait for a free slot, record the admission and return its time
    pub async fn acquire(&self) -> Instant {
        loop {
            {
                let mut stamps = self.stamps.lock().await;
                let now = Instant::now();
                evict(&mut stamps, now, self.window);

                if stamps.len() < self.max_per_window {
                    stamps.push_back(now);
                    return now;
                }
                trace!(in_window = stamps.len(), "Rate limit reached, waiting");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Admissions currently inside the trailing window
    pub async fn occupancy(&self) -> usize {
        let mut stamps = self.stamps.lock().await;
        evict(&mut stamps, Instant::now(), self.window);
        stamps.len()
    }

    /// Configured ceiling
    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }
}

fn evict(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = stamps.front() {
        if now.duration_since(*front) > window {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_admits_up_to_ceiling_immediately() {
        let limiter = RateLimiter::with_window(3, Duration::from_secs(10), Duration::from_millis(5));
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.occupancy().await, 3);
    }

    #[tokio::test]
    async fn test_zero_ceiling_is_raised() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.max_per_window(), 1);
    }

    #[tokio::test]
    async fn test_burst_never_exceeds_ceiling_in_window() {
        let n = 3;
        let window = Duration::from_millis(200);
        let limiter = Arc::new(RateLimiter::with_window(n, window, Duration::from_millis(5)));

        let mut handles = Vec::new();
        for _ in 0..n + 5 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }

        // Sample occupancy while the burst drains
        let sampler = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let mut max_seen = 0;
                for _ in 0..60 {
                    max_seen = max_seen.max(limiter.occupancy().await);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                max_seen
            })
        };

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();

        for i in 0..stamps.len() - n {
            assert!(
                stamps[i + n].duration_since(stamps[i]) > window,
                "admissions {} and {} fall in one window",
                i,
                i + n
            );
        }

        assert!(sampler.await.unwrap() <= n);
    }
}
