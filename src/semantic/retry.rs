//! Retry with exponential backoff for remote calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Default number of attempts (first call included).
pub const MAX_RETRIES: u32 = 3;

/// Default delay before the first retry; doubles on every retry.
pub const BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Whether an error message describes a condition worth retrying.
///
/// Matches network failures, timeouts, connection resets, rate limiting
/// and HTTP 429/503. Everything else (bad credentials, malformed requests)
/// is fatal on first occurrence.
pub fn is_transient_error(msg: &str) -> bool {
    let msg_lower = msg.to_lowercase();

    msg_lower.contains("network")
        || msg_lower.contains("timeout")
        || msg_lower.contains("timed out")
        || msg_lower.contains("econnreset")
        || msg_lower.contains("connection reset")
        || msg_lower.contains("rate limit")
        || msg_lower.contains("too many requests")
        || msg_lower.contains("429")
        || msg_lower.contains("503")
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy runs out of attempts. The last error is returned.
pub async fn with_retry<T, E, F, Fut, P>(policy: &RetryPolicy, mut op: F, is_transient: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && is_transient(&err) => {
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "retrying (attempt {}/{}) after error: {}, backoff {}ms",
                    attempt + 1,
                    max_attempts,
                    err,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_transient_patterns() {
        assert!(is_transient_error("network error: dns failure"));
        assert!(is_transient_error("request timeout: deadline exceeded"));
        assert!(is_transient_error("operation timed out"));
        assert!(is_transient_error("read ECONNRESET"));
        assert!(is_transient_error("Connection reset by peer"));
        assert!(is_transient_error("Rate limit reached for requests"));
        assert!(is_transient_error("Too Many Requests"));
        assert!(is_transient_error("HTTP 429: slow down"));
        assert!(is_transient_error("HTTP 503: unavailable"));
    }

    #[test]
    fn test_fatal_patterns() {
        assert!(!is_transient_error("HTTP 401: Incorrect API key provided"));
        assert!(!is_transient_error("HTTP 400: malformed request"));
        assert!(!is_transient_error("malformed response: missing field `data`"));
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = with_retry(
            &fast_policy(),
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("HTTP 503: try later".to_string())
                } else {
                    Ok(n)
                }
            },
            |e| is_transient_error(e),
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = with_retry(
            &fast_policy(),
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("network error".to_string())
            },
            |e| is_transient_error(e),
        )
        .await;

        assert_eq!(result, Err("network error".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = with_retry(
            &fast_policy(),
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("HTTP 401: bad key".to_string())
            },
            |e| is_transient_error(e),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
