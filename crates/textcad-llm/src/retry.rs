//! Bounded exponential backoff for throttled backends

use crate::error::Result;
use crate::provider::send_raw;
use reqwest::RequestBuilder;
use std::time::Duration;
use tracing::warn;

/// HTTP status used by backends to signal throttling
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Retry schedule for throttled calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Sleep before the first retry
    pub initial_backoff: Duration,
    /// Growth factor between consecutive sleeps
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: u32, initial_backoff: Duration, multiplier: u32) -> Self {
        Self {
            max_retries,
            initial_backoff,
            multiplier,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, 1)
    }

    /// Sleep before retry number `retry` (0-based)
    pub fn backoff_for_retry(&self, retry: u32) -> Duration {
        self.initial_backoff * self.multiplier.saturating_pow(retry)
    }
}

impl Default for RetryPolicy {
    /// 3 retries sleeping 1s, 2s, 4s
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2)
    }
}

/// Outcome of a call that may have been retried
#[derive(Debug)]
pub(crate) struct Exchange {
    pub status: u16,
    pub body: String,
    pub attempts: u32,
    pub backoffs: Vec<Duration>,
}

/// Send the request built by `build`, retrying while the backend answers
/// with 429 and the policy allows it. The last response is returned as-is,
/// throttled or not; the caller decides how to map the status.
pub(crate) async fn send_with_backoff<F>(policy: &RetryPolicy, mut build: F) -> Result<Exchange>
where
    F: FnMut() -> RequestBuilder,
{
    let mut backoffs = Vec::new();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let (status, body) = send_raw(build()).await?;

        let retries_done = attempts - 1;
        if status != TOO_MANY_REQUESTS || retries_done >= policy.max_retries {
            return Ok(Exchange {
                status,
                body,
                attempts,
                backoffs,
            });
        }

        let delay = policy.backoff_for_retry(retries_done);
        warn!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Backend throttled the request, backing off"
        );
        tokio::time::sleep(delay).await;
        backoffs.push(delay);
    }
}
