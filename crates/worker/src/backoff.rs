//! Exponential backoff for establishing the Temporal connection
//!
//! Only the initial connection is retried locally. Workflow and activity
//! retries are owned by the Temporal server.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::warn;

/// Exponential backoff policy with jitter and an overall time limit
///
/// There is no attempt cap: the policy gives up only once the next wait would
/// push the total elapsed time past `max_elapsed_time`.
///
/// # Example
///
/// ```
/// use cart_worker::ExponentialBackoff;
/// use std::time::Duration;
///
/// let policy = ExponentialBackoff::default()
///     .with_initial_interval(Duration::from_millis(500))
///     .with_max_elapsed_time(Some(Duration::from_secs(60)));
///
/// // First retry after ~500ms
/// // Second retry after ~750ms
/// // Third retry after ~1.125s
/// // etc.
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay before the first retry
    pub initial_interval: Duration,

    /// Maximum delay between retries
    pub max_interval: Duration,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Jitter factor (0.0-1.0)
    ///
    /// A value of 0.5 means ±50% randomness.
    pub jitter: f64,

    /// Total time after which no further retry is attempted; `None` retries forever
    pub max_elapsed_time: Option<Duration>,
}

impl Default for ExponentialBackoff {
    /// - 500ms initial interval
    /// - 1.5x multiplier
    /// - 50% jitter
    /// - 60 second max interval
    /// - 15 minute max elapsed time
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(60),
            multiplier: 1.5,
            jitter: 0.5,
            max_elapsed_time: Some(Duration::from_secs(15 * 60)),
        }
    }
}

impl ExponentialBackoff {
    /// Set the initial retry interval
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the maximum retry interval
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set the backoff multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the jitter factor (0.0-1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Set the overall time limit
    pub fn with_max_elapsed_time(mut self, limit: Option<Duration>) -> Self {
        self.max_elapsed_time = limit;
        self
    }

    /// Calculate delay for a given attempt number (1-based)
    ///
    /// Returns the duration to wait before that attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let retry_num = attempt - 1;
        let base = self.initial_interval.as_secs_f64()
            * self
                .multiplier
                .powi(retry_num.saturating_sub(1).min(i32::MAX as u32) as i32);
        let capped = base.min(self.max_interval.as_secs_f64());

        let jitter_range = capped * self.jitter;
        let jittered = if jitter_range > 0.0 {
            let offset = rand::thread_rng().gen_range(-jitter_range..jitter_range);
            (capped + offset).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered)
    }

    /// Whether another wait of `next_delay` still fits in the time limit
    pub fn allows(&self, elapsed: Duration, next_delay: Duration) -> bool {
        match self.max_elapsed_time {
            Some(limit) => elapsed + next_delay <= limit,
            None => true,
        }
    }
}

/// The policy gave up; carries the number of attempts made and the last error
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` until it succeeds or the policy gives up
///
/// Every error is treated as retryable.
pub async fn retry<T, E, F, Fut>(
    policy: &ExponentialBackoff,
    mut operation: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let last_error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let delay = policy.delay_for_attempt(attempts + 1);
        if !policy.allows(started.elapsed(), delay) {
            return Err(Exhausted {
                attempts,
                last_error,
            });
        }

        warn!(
            attempt = attempts,
            retry_in_ms = delay.as_millis() as u64,
            error = %last_error,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_defaults() {
        let policy = ExponentialBackoff::default();
        assert_eq!(policy.initial_interval, Duration::from_millis(500));
        assert_eq!(policy.multiplier, 1.5);
        assert_eq!(policy.max_interval, Duration::from_secs(60));
        assert_eq!(policy.max_elapsed_time, Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = ExponentialBackoff::default().with_jitter(0.0);

        // Attempt 1 (initial) has no delay
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(750));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(1125));
    }

    #[test]
    fn test_max_interval_cap() {
        let policy = ExponentialBackoff::default()
            .with_max_interval(Duration::from_secs(5))
            .with_jitter(0.0);

        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = ExponentialBackoff::default().with_jitter(0.5);

        for _ in 0..100 {
            let delay = policy.delay_for_attempt(2);
            assert!(delay >= Duration::from_millis(250));
            assert!(delay <= Duration::from_millis(750));
        }
    }

    #[test]
    fn test_allows_without_limit() {
        let policy = ExponentialBackoff::default().with_max_elapsed_time(None);
        assert!(policy.allows(Duration::from_secs(86_400), Duration::from_secs(60)));
    }

    #[test]
    fn test_allows_respects_limit() {
        let policy =
            ExponentialBackoff::default().with_max_elapsed_time(Some(Duration::from_secs(10)));
        assert!(policy.allows(Duration::from_secs(4), Duration::from_secs(6)));
        assert!(!policy.allows(Duration::from_secs(5), Duration::from_secs(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let policy = ExponentialBackoff::default().with_jitter(0.0);

        let result = retry(&policy, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 4 {
                Err(format!("refused {n}"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_at_elapsed_limit() {
        let policy = ExponentialBackoff::default()
            .with_initial_interval(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_jitter(0.0)
            .with_max_elapsed_time(Some(Duration::from_secs(1)));

        // Waits of 100ms, 200ms and 400ms fit in one second; the next 800ms does not
        let result: Result<(), _> = retry(&policy, || async { Err("refused") }).await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 4);
        assert_eq!(exhausted.last_error, "refused");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_first_try() {
        let policy = ExponentialBackoff::default();
        let result: Result<u8, Exhausted<String>> = retry(&policy, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
