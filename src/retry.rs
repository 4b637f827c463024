//! Bounded retry with exponential backoff and jitter.
//!
//! Applied only to the weather archive calls: a transient 5xx or network
//! blip there would otherwise leave a row unenriched until the next run.
//! Scraped pages and geocoding calls are deliberately not retried; a single
//! failure there is a per-row skip.

use anyhow::Result;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the initial try
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Cap on the per-attempt backoff delay in milliseconds
    pub max_delay_ms: u64,
    /// Cap on total elapsed time across all attempts in milliseconds
    pub max_elapsed_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 200,
            max_delay_ms: 2000,
            max_elapsed_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Load the policy from `WEATHER_RETRY_*` environment variables,
    /// falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: std::env::var("WEATHER_RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0 && n <= 10)
                .unwrap_or(defaults.max_attempts),
            base_delay_ms: std::env::var("WEATHER_RETRY_BASE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.base_delay_ms),
            max_delay_ms: std::env::var("WEATHER_RETRY_MAX_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_delay_ms),
            max_elapsed_ms: std::env::var("WEATHER_RETRY_MAX_ELAPSED_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_elapsed_ms),
        }
    }

    /// Backoff delay for a given attempt, with full jitter.
    ///
    /// min(max_delay, base_delay * 2^(attempt-1)), then a random value in
    /// [0, capped) so repeated runs do not hammer the archive in lockstep.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let capped = self.capped_backoff_ms(attempt);
        if capped == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..capped)
        }
    }

    fn capped_backoff_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        let multiplier = if exponent >= 32 {
            u64::MAX
        } else {
            1u64 << exponent
        };
        self.base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms)
    }

    /// Backoff with caller-supplied jitter, for deterministic tests.
    #[cfg(test)]
    pub fn backoff_ms_with_jitter(&self, attempt: u32, jitter_fn: impl Fn(u64) -> u64) -> u64 {
        jitter_fn(self.capped_backoff_ms(attempt))
    }
}

/// Error information extracted from a failed attempt
#[derive(Debug)]
pub struct RetryableError {
    /// HTTP status code, when the failure was an HTTP response
    pub status_code: Option<u16>,
    /// Error message or reason
    pub message: String,
}

impl RetryableError {
    pub fn from_status(status: u16, message: String) -> Self {
        Self {
            status_code: Some(status),
            message,
        }
    }

    pub fn from_network(message: String) -> Self {
        Self {
            status_code: None,
            message,
        }
    }

    /// Classify an `anyhow::Error` by inspecting its chain for reqwest errors.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = err.to_string();

        if let Some(reqwest_err) = err.downcast_ref::<reqwest::Error>() {
            if let Some(status) = reqwest_err.status() {
                return Self::from_status(status.as_u16(), message);
            }
            if reqwest_err.is_timeout() || reqwest_err.is_connect() {
                return Self::from_network(message);
            }
        }

        // Unclassified errors are treated as network (retryable)
        Self::from_network(message)
    }
}

/// Whether a failed attempt is worth retrying.
///
/// Retryable: network/IO errors, 408, 425, 429, and 5xx.
/// Not retryable: other 4xx client errors.
pub fn is_retryable(err: &RetryableError) -> bool {
    match err.status_code {
        Some(status) => matches!(status, 408 | 425 | 429 | 500..=599),
        None => true,
    }
}

/// Run an async operation under the given retry policy.
///
/// Retries on retryable errors until `max_attempts` or `max_elapsed_ms` is
/// hit, sleeping a jittered backoff between attempts. The final error is
/// returned unchanged.
pub async fn retry_async<T, Fut, F>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start = std::time::Instant::now();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        "retry op={} succeeded after {} attempts (elapsed={}ms)",
                        op_name,
                        attempt,
                        start.elapsed().as_millis()
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                let retry_err = RetryableError::from_anyhow(&err);

                if !is_retryable(&retry_err) {
                    debug!(
                        "retry op={} non-retryable error: {}",
                        op_name, retry_err.message
                    );
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    warn!(
                        "retry op={} failed after {} attempts (elapsed={}ms): {}",
                        op_name,
                        attempt,
                        start.elapsed().as_millis(),
                        retry_err.message
                    );
                    return Err(err);
                }

                let elapsed_ms = start.elapsed().as_millis() as u64;
                if elapsed_ms >= policy.max_elapsed_ms {
                    warn!(
                        "retry op={} timeout after {}ms (max={}ms): {}",
                        op_name, elapsed_ms, policy.max_elapsed_ms, retry_err.message
                    );
                    return Err(err);
                }

                let remaining_ms = policy.max_elapsed_ms.saturating_sub(elapsed_ms);
                let backoff_ms = policy.backoff_ms(attempt).min(remaining_ms);

                debug!(
                    "retry op={} attempt={} backoff_ms={} status={:?}",
                    op_name, attempt, backoff_ms, retry_err.status_code
                );

                if backoff_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }

                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 200);
        assert_eq!(policy.max_delay_ms, 2000);
        assert_eq!(policy.max_elapsed_ms, 10_000);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        // Deterministic jitter: keep the full cap
        let jitter = |cap: u64| cap;

        assert_eq!(policy.backoff_ms_with_jitter(1, jitter), 200);
        assert_eq!(policy.backoff_ms_with_jitter(2, jitter), 400);
        assert_eq!(policy.backoff_ms_with_jitter(3, jitter), 800);
        assert_eq!(policy.backoff_ms_with_jitter(4, jitter), 1600);
        // 200 * 2^4 = 3200, capped to 2000
        assert_eq!(policy.backoff_ms_with_jitter(5, jitter), 2000);
        assert_eq!(policy.backoff_ms_with_jitter(20, jitter), 2000);
    }

    #[test]
    fn retryable_statuses() {
        for status in [408, 425, 429, 500, 502, 503, 504] {
            let err = RetryableError::from_status(status, "err".to_string());
            assert!(is_retryable(&err), "status {} should be retryable", status);
        }
        for status in [400, 401, 403, 404] {
            let err = RetryableError::from_status(status, "err".to_string());
            assert!(!is_retryable(&err), "status {} should not retry", status);
        }
        let err = RetryableError::from_network("connection reset".to_string());
        assert!(is_retryable(&err));
    }

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay_ms: 1,
            max_delay_ms: 5,
            max_elapsed_ms: 1000,
        };

        let mut attempts = 0;
        let result = retry_async(&policy, "test_op", || {
            attempts += 1;
            async move {
                if attempts < 2 {
                    anyhow::bail!("transient failure");
                }
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            max_elapsed_ms: 1000,
        };

        let mut attempts = 0;
        let result: Result<i32> = retry_async(&policy, "test_op", || {
            attempts += 1;
            async move { anyhow::bail!("persistent failure") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }
}
