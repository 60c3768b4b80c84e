//! Retry policy with exponential backoff and jitter.
//!
//! Only outcomes classified retryable by [`Error::is_retryable`] are
//! re-attempted: network-level failures, 5xx responses, and 429.
//! Validation errors and other 4xx responses surface immediately.
//! Cancellation is the caller dropping the returned future; a drop
//! mid-backoff aborts the wait with no further attempt.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::errors::{Error, Result};

/// Backoff parameters for retryable request failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before retry `n` is `base_delay * 2^n`, jittered.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Fraction of the delay randomized in both directions (~10%).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given retry count and default backoff shape.
    pub fn with_max_retries(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            ..RetryPolicy::default()
        }
    }

    /// The jittered delay before retry attempt `attempt` (0-based), or
    /// `None` once the budget is exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }

        let exp = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());

        let jittered = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            capped - spread + rand::thread_rng().gen_range(0.0..=2.0 * spread)
        } else {
            capped
        };

        Some(Duration::from_secs_f64(jittered))
    }
}

/// Run `op` until it succeeds, fails non-retryably, or exhausts the
/// retry budget. Exhaustion wraps the last error with the attempt
/// count.
pub async fn execute_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => match policy.next_delay(attempt) {
                Some(delay) => {
                    warn!(
                        "retryable failure (attempt {}/{}), backing off {:?}: {}",
                        attempt + 1,
                        policy.max_retries + 1,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    debug!("retry budget exhausted after {} attempts", attempt + 1);
                    return Err(Error::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(err),
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter: 0.0,
        }
    }

    fn unavailable() -> Error {
        Error::Http {
            status: 503,
            body: "service unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = execute_with_retry(&fast_policy(3), move || {
            let counter = counter.clone();
            async move {
                // Three 503s, then success on the fourth attempt.
                if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(unavailable())
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhaustion_wraps_with_attempt_count() {
        let result: Result<()> =
            execute_with_retry(&fast_policy(2), || async { Err(unavailable()) }).await;

        match result.unwrap_err() {
            Error::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.status(), Some(503));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_error_surfaces_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = execute_with_retry(&fast_policy(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::validation("name", "required"))
            }
        })
        .await;

        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_mid_backoff_stops_further_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            jitter: 0.0,
        };

        let handle = tokio::spawn(async move {
            let _: Result<()> = execute_with_retry(&policy, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(unavailable())
                }
            })
            .await;
        });

        // Let the first attempt fail and the backoff start.
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            jitter: 0.0,
        };
        assert_eq!(policy.next_delay(0), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(4)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_secs(8)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_secs(8)));
        assert_eq!(policy.next_delay(10), None);
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            jitter: 0.1,
        };
        for _ in 0..100 {
            let delay = policy.next_delay(0).unwrap().as_secs_f64();
            assert!((9.0..=11.0).contains(&delay), "delay {delay} out of range");
        }
    }
}
