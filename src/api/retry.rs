use backoff::{future::retry_notify, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::error::AttemptError;

/// Base delay; the wait before retry `n` is `BASE_DELAY * 2^n`
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// Default ceiling on attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Exponential backoff with no jitter and no elapsed-time limit.
///
/// The attempt ceiling, not elapsed time, ends the retry loop. The first wait is
/// `2 * base`, then it doubles without a cap.
pub(crate) fn create_backoff(base: Duration) -> ExponentialBackoff {
    let first = base * 2;
    ExponentialBackoff {
        current_interval: first,
        initial_interval: first,
        randomization_factor: 0.0,
        multiplier: 2.0,
        max_interval: Duration::MAX,
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Runs `operation` until it succeeds or `max_attempts` attempts have failed.
///
/// `operation` receives the 1-based attempt number. Returns the last failure and the
/// number of attempts made.
pub(crate) async fn with_retry<F, Fut, T>(
    base: Duration,
    max_attempts: u32,
    mut operation: F,
) -> Result<T, (AttemptError, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0u32;

    let result = retry_notify(
        create_backoff(base),
        || {
            attempts += 1;
            let attempt = attempts;
            let fut = operation(attempt);
            async move {
                fut.await.map_err(|e| {
                    if attempt >= max_attempts {
                        backoff::Error::permanent(e)
                    } else {
                        backoff::Error::transient(e)
                    }
                })
            }
        },
        |e: AttemptError, wait: Duration| {
            warn!(error = %e, wait_ms = wait.as_millis() as u64, "Attempt failed, will retry");
        },
    )
    .await;

    result.map_err(|e| (e, attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn transient() -> AttemptError {
        TransportError::Connect("refused".to_string()).into()
    }

    #[test]
    fn create_backoff_should_start_at_twice_the_base() {
        let backoff = create_backoff(BASE_DELAY);

        assert_eq!(backoff.initial_interval, Duration::from_millis(1000));
        assert_eq!(backoff.current_interval, Duration::from_millis(1000));
    }

    #[test]
    fn create_backoff_should_have_no_jitter_or_deadline() {
        let backoff = create_backoff(BASE_DELAY);

        assert_eq!(backoff.randomization_factor, 0.0);
        assert!((backoff.multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(backoff.max_elapsed_time, None);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_should_succeed_on_first_try() {
        let result = with_retry(BASE_DELAY, 3, |_| async { Ok::<_, AttemptError>("success") }).await;

        assert_eq!(result.unwrap(), "success");
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_should_retry_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = with_retry(BASE_DELAY, 3, |_| {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_should_stop_at_ceiling_and_report_count() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = with_retry(BASE_DELAY, 3, |_| {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AttemptError::status(500, "boom"))
            }
        })
        .await;

        let (error, count) = result.unwrap_err();
        assert_eq!(count, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(error.status_code(), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_should_wait_one_then_two_seconds() {
        let start = Instant::now();

        let result = with_retry(BASE_DELAY, 3, |_| async { Err::<(), _>(transient()) }).await;

        assert!(result.is_err());
        // 1s + 2s between three attempts, no wait after the last
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_should_keep_doubling_past_a_minute() {
        let started = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let started_clone = Arc::clone(&started);

        let result = with_retry(BASE_DELAY, 8, |_| {
            started_clone.lock().push(Instant::now());
            async { Err::<(), _>(transient()) }
        })
        .await;

        assert_eq!(result.unwrap_err().1, 8);
        let started = started.lock();
        let waits: Vec<u64> = started
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_secs())
            .collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 16, 32, 64]);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_should_treat_zero_ceiling_as_single_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = with_retry(BASE_DELAY, 0, |_| {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transient())
            }
        })
        .await;

        assert_eq!(result.unwrap_err().1, 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
