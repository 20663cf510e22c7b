//! Retry policy for rate-limited requests.
//!
//! Backoff is a pure function of the failure count so the policy can be
//! tested without a transport.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::Result;

/// Bounded exponential backoff, applied to rate-limited failures only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay to wait after the `failures`-th rate-limited failure (1-based),
    /// or `None` once the attempt budget is spent.
    pub fn backoff(&self, failures: u32) -> Option<Duration> {
        if failures == 0 || failures > self.max_retries {
            return None;
        }
        Some(self.base_delay * 2u32.pow(failures - 1))
    }

    /// Total attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Run `op`, retrying rate-limited failures according to `policy`.
///
/// Any other failure propagates immediately; exhausting the budget
/// propagates the last rate-limited failure. Callers never observe the
/// individual attempts.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = 0;
    loop {
        match op().await {
            Err(e) if e.is_rate_limited() => {
                failures += 1;
                match policy.backoff(failures) {
                    Some(delay) => {
                        warn!(
                            failures,
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                }
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::TranslateError;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Some(Duration::from_millis(1000)));
        assert_eq!(policy.backoff(2), Some(Duration::from_millis(2000)));
        assert_eq!(policy.backoff(3), None);
        assert_eq!(policy.backoff(0), None);
        assert_eq!(policy.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_success() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result = with_retry(&policy, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(TranslateError::RateLimited)
                } else {
                    Ok("hola".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "hola");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // 1000ms after the first failure, 2000ms after the second.
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_fails_fast() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<String> = with_retry(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TranslateError::Api("boom".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(TranslateError::Api(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_rate_limit() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);

        let result: Result<String> = with_retry(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TranslateError::RateLimited) }
        })
        .await;

        assert!(matches!(result, Err(TranslateError::RateLimited)));
        assert_eq!(attempts.load(Ordering::SeqCst), policy.attempts());
    }
}
