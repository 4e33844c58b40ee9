//! Retry with exponential backoff for aggregate writes.
//!
//! The store offers no multi-record rollback, so a write that fails after its
//! sibling already committed is retried rather than undone. Writes are full
//! upserts or idempotent deltas, which makes re-issuing them safe.
//!
//! # Example
//!
//! ```rust
//! use conclave_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_millis(20))
//!     .build();
//!
//! let value = retry_with_predicate(
//!     &policy,
//!     "example",
//!     || async { Ok::<_, String>(42) },
//!     |err: &String| err.contains("timeout"),
//! )
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use crate::metrics::EnrollmentMetrics;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(50);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Backoff configuration for a single aggregate write.
///
/// Defaults to 3 retries, starting at 50ms and doubling up to 2s.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Start from the default policy and override individual knobs.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder(Self::default())
    }

    /// Single attempt, no backoff.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Backoff before retry `attempt` (zero-based):
    /// `initial_delay * multiplier^attempt`, never above `max_delay`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ceiling = self.max_delay.as_millis() as f64;
        let scaled = self.initial_delay.as_millis() as f64
            * self.multiplier.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        if scaled.is_finite() && scaled < ceiling {
            Duration::from_millis(scaled as u64)
        } else {
            self.max_delay
        }
    }
}

/// Builder for [`RetryPolicy`], seeded with the defaults.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder(RetryPolicy);

impl RetryPolicyBuilder {
    /// Retries after the first attempt.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.0.max_retries = retries;
        self
    }

    /// Backoff before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.0.initial_delay = delay;
        self
    }

    /// Upper bound for every backoff.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.0.max_delay = delay;
        self
    }

    /// Growth factor between consecutive backoffs.
    #[must_use]
    pub const fn multiplier(mut self, factor: f64) -> Self {
        self.0.multiplier = factor;
        self
    }

    /// Finish the policy.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.0
    }
}

/// Runs `operation` until it succeeds, fails permanently, or retries run out.
///
/// `target` names what is being written (`"event"`, `"participant"`) in logs
/// and in the `enrollment_write_retries_total` counter.
///
/// # Errors
///
/// Returns the first error `is_retryable` rejects, or the last error once
/// `policy.max_retries` retries are exhausted.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    target: &'static str,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(written) => {
                if attempt > 0 {
                    tracing::info!(record = target, attempt, "Write went through after retrying");
                }
                return Ok(written);
            },
            Err(err) => err,
        };

        if !is_retryable(&err) {
            tracing::warn!(record = target, error = %err, "Write rejected by store, not retrying");
            return Err(err);
        }
        if attempt >= policy.max_retries {
            tracing::error!(record = target, attempt, error = %err, "Write retries exhausted");
            return Err(err);
        }

        let backoff = policy.delay_for_attempt(attempt);
        tracing::warn!(
            record = target,
            attempt,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "Transient write failure, backing off"
        );
        EnrollmentMetrics::record_write_retry(target);
        sleep(backoff).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delay_doubles_until_cap() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_millis(500))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(500));
    }

    #[test]
    fn defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
        assert_eq!(RetryPolicy::no_retry().max_retries, 0);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let policy = RetryPolicy::builder()
            .max_retries(3)
            .initial_delay(Duration::from_millis(1))
            .build();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = retry_with_predicate(
            &policy,
            "test",
            || {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err("timeout") } else { Ok(n) }
                }
            },
            |err: &&str| *err == "timeout",
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy::builder()
            .max_retries(2)
            .initial_delay(Duration::from_millis(1))
            .build();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = retry_with_predicate(
            &policy,
            "test",
            || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("timeout")
                }
            },
            |_: &&str| true,
        )
        .await;

        assert_eq!(result, Err("timeout"));
        assert_eq!(calls.load(Ordering::SeqCst), 3); // first try + 2 retries
    }

    #[tokio::test]
    async fn permanent_errors_fail_fast() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result = retry_with_predicate(
            &RetryPolicy::default(),
            "test",
            || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("corrupt record")
                }
            },
            |err: &&str| err.contains("timeout"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
