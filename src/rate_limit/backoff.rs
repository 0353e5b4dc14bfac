//! Exponential backoff with jitter.
//!
//! Delays double with each attempt up to a ceiling, then get perturbed by up
//! to ±20% so concurrent callers hitting the same endpoint spread out.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{ClassifiedError, RawError, classify};
use crate::rate_limit::limits;

/// Fraction of the bounded delay used as the jitter amplitude.
pub const JITTER_FACTOR: f64 = 0.2;

/// Default retry cap for [`retry_with_default_backoff`].
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default first backoff step for [`retry_with_default_backoff`].
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Compute the delay before retry number `attempt + 1`.
///
/// The result is always within `[0, max_delay * 1.2]`.
pub fn compute_delay(attempt: u32, base_delay: Duration, max_delay: Duration) -> Duration {
    let unit = rand::thread_rng().gen_range(-1.0..=1.0);
    compute_delay_with_jitter(attempt, base_delay, max_delay, unit)
}

/// [`compute_delay`] with an explicit jitter sample in `[-1, 1]`.
///
/// Out-of-range samples are clamped.
pub fn compute_delay_with_jitter(
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    unit: f64,
) -> Duration {
    let bounded = exponential(attempt, base_delay).min(max_delay);
    let unit = if unit.is_nan() { 0.0 } else { unit.clamp(-1.0, 1.0) };

    let bounded_nanos = bounded.as_nanos() as f64;
    let jitter_nanos = bounded_nanos * JITTER_FACTOR * unit;
    let total = (bounded_nanos + jitter_nanos).max(0.0).round();
    Duration::from_nanos(total.min(u64::MAX as f64) as u64)
}

/// `base_delay * 2^attempt`, saturating at `Duration::MAX`.
fn exponential(attempt: u32, base_delay: Duration) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base_delay.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}

/// Retry `operation` while it fails with "Too Many Requests".
///
/// Makes at most `max_retries + 1` attempts, sleeping [`compute_delay`]
/// between them. Any other classification is returned on first occurrence.
/// There is no token bucket involved; for per-endpoint budgeting use
/// [`RateLimiterRegistry::with_rate_limit`](crate::rate_limit::RateLimiterRegistry::with_rate_limit).
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, ClassifiedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<RawError>,
{
    let max_delay = limits::DEFAULT_MAX_DELAY.max(base_delay);
    let mut attempt = 0;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => classify(&e.into()),
        };

        if !error.is_retryable() || attempt >= max_retries {
            if error.is_retryable() {
                tracing::warn!(attempts = attempt + 1, "giving up after repeated rate limiting");
            }
            return Err(error);
        }

        let delay = compute_delay(attempt, base_delay, max_delay);
        tracing::warn!(
            attempt = attempt + 1,
            max_retries,
            delay_ms = delay.as_millis() as u64,
            "rate limited, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// [`retry_with_backoff`] with 3 retries starting at one second.
pub async fn retry_with_default_backoff<F, Fut, T, E>(operation: F) -> Result<T, ClassifiedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<RawError>,
{
    retry_with_backoff(operation, DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    const BASE: Duration = Duration::from_millis(1_000);
    const MAX: Duration = Duration::from_millis(30_000);

    #[test]
    fn test_exponential_growth_without_jitter() {
        assert_eq!(compute_delay_with_jitter(0, BASE, MAX, 0.0), Duration::from_secs(1));
        assert_eq!(compute_delay_with_jitter(1, BASE, MAX, 0.0), Duration::from_secs(2));
        assert_eq!(compute_delay_with_jitter(3, BASE, MAX, 0.0), Duration::from_secs(8));
        assert_eq!(compute_delay_with_jitter(5, BASE, MAX, 0.0), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_extremes() {
        assert_eq!(
            compute_delay_with_jitter(10, BASE, MAX, 1.0),
            Duration::from_secs(36)
        );
        assert_eq!(
            compute_delay_with_jitter(0, BASE, MAX, -1.0),
            Duration::from_millis(800)
        );
        // Out-of-range samples are clamped.
        assert_eq!(
            compute_delay_with_jitter(0, BASE, MAX, -7.0),
            Duration::from_millis(800)
        );
    }

    #[test]
    fn test_delay_is_bounded_for_all_attempts() {
        let ceiling = MAX + MAX / 5;
        for attempt in 0..200 {
            for _ in 0..20 {
                let delay = compute_delay(attempt, BASE, MAX);
                assert!(delay <= ceiling, "attempt {} gave {:?}", attempt, delay);
            }
        }
        // Huge attempts must not overflow.
        assert!(compute_delay(u32::MAX, BASE, MAX) <= ceiling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_only_rate_limits() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let result = retry_with_backoff(
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(RawError::status(429))
                    } else {
                        Ok("done")
                    }
                }
            },
            3,
            BASE,
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1000ms * (2^0 + 2^1) with the -20% jitter floor.
        assert!(start.elapsed() >= Duration::from_millis(2_400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = retry_with_backoff(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RawError::status(404)) }
            },
            5,
            BASE,
        )
        .await;

        assert_eq!(result, Err(ClassifiedError::NotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = retry_with_default_backoff(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err("Too many requests") }
        })
        .await;

        assert_eq!(result, Err(ClassifiedError::TooManyRequests));
        assert_eq!(calls.load(Ordering::SeqCst), DEFAULT_MAX_RETRIES + 1);
    }
}
