//! Retry with exponential backoff for store conflicts.
//!
//! Token issuance relies on the store's uniqueness constraint to keep one
//! active token per booking. Two concurrent issuers can both pass the
//! "revoke previous" step and then collide on insert; the loser retries.
//! [`retry_with_predicate`] runs that loop, retrying only the errors the
//! caller marks as conflicts.
//!
//! # Example
//!
//! ```rust
//! use stayline_runtime::retry::{RetryPolicy, retry_with_predicate};
//!
//! # async fn example() -> Result<(), String> {
//! let value = retry_with_predicate(
//!     RetryPolicy::default(),
//!     || async { Ok::<_, String>(42) },
//!     |err: &String| err.contains("conflict"),
//! )
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// Tuned for short-lived row conflicts, not network outages:
///
/// - `max_retries`: 4 (five attempts in total)
/// - `initial_delay`: 5ms
/// - `max_delay`: 200ms
/// - `multiplier`: 2.0
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: usize,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Set maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial delay before first retry.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Base delay for a given attempt: `initial_delay * multiplier ^ attempt`,
    /// capped at `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);

        delay.min(self.max_delay)
    }

    /// Base delay plus up to 50% random jitter, so colliding writers do not
    /// retry in lockstep.
    #[must_use]
    pub fn jittered_delay(&self, attempt: usize) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let spread = u64::try_from(base.as_micros() / 2).unwrap_or(u64::MAX);
        if spread == 0 {
            return base;
        }
        base + Duration::from_micros(rand::thread_rng().gen_range(0..=spread))
    }
}

/// Retry an async operation while `is_retryable` says the error is transient.
///
/// Non-retryable errors return immediately. When retries are exhausted the
/// last error is returned.
///
/// # Errors
///
/// Returns the operation's error if it is not retryable or retries run out.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }

                if attempt >= policy.max_retries {
                    tracing::error!(
                        attempt,
                        error = %err,
                        "Operation still conflicting after max retries"
                    );
                    return Err(err);
                }

                let delay = policy.jittered_delay(attempt);
                tracing::warn!(
                    attempt,
                    delay_us = delay.as_micros(),
                    error = %err,
                    "Conflict, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
