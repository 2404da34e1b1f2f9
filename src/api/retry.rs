//! Backoff for rate-limited requests.
//!
//! A 429 response is retried after either the delay the server asked for or
//! an exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::config::{seconds, RetrySettings};

/// Fallback header consulted when `Retry-After` is absent.
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Header added to retried requests, carrying the retry number (1-indexed).
pub const RETRY_ATTEMPT_HEADER: &str = "x-retry-attempt";

/// Jitter band applied to computed backoff.
const JITTER_MIN: f64 = 0.7;
const JITTER_MAX: f64 = 1.3;

/// Rate-limit retry policy for one client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// How many times a rate-limited request is retried.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_delay: Duration,
    /// Cap for the exponential backoff, before jitter.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: seconds(settings.initial_retry_delay),
            max_delay: seconds(settings.max_retry_delay),
        }
    }
}

impl RetryPolicy {
    /// Whether a request that has already been retried `attempt` times may be
    /// retried again.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// The delay before retry number `attempt + 1`.
    ///
    /// A parseable `retry_after` hint is used verbatim. Otherwise the delay is
    /// `min(initial * 2^attempt, max)` scaled by a random factor in
    /// `[0.7, 1.3]`.
    pub fn delay(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if let Some(hint) = retry_after.and_then(parse_retry_after) {
            return hint;
        }

        let jitter = rand::rng().random_range(JITTER_MIN..=JITTER_MAX);
        seconds(self.backoff(attempt).as_secs_f64() * jitter)
    }

    /// Exponential backoff for `attempt`, capped at `max_delay`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * 2f64.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }
}

/// Extract the server's retry hint: `Retry-After`, else `X-RateLimit-Reset`.
pub fn retry_after_hint(headers: &HeaderMap) -> Option<String> {
    headers
        .get(RETRY_AFTER)
        .or_else(|| headers.get(RATE_LIMIT_RESET))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Parse a retry hint as a number of seconds.
///
/// Non-numeric values (HTTP dates, ISO timestamps), negatives and
/// non-finite numbers are rejected.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
