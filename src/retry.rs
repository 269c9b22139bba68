//! Retry logic with exponential backoff
//!
//! Fetch workers never give up on an id on their own: a failed attempt is
//! retried for the same id after an exponentially growing delay. The loop ends
//! when the operation succeeds, when the optional retry budget in
//! [`RetryConfig`] runs out, or when the shared cancellation token fires.
//!
//! # Example
//!
//! ```no_run
//! use hn_crawl::config::RetryConfig;
//! use hn_crawl::retry::{IsRetryable, RetryError, fetch_with_retry};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! struct Flaky;
//!
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "flaky")
//!     }
//! }
//!
//! impl IsRetryable for Flaky {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() -> Result<(), RetryError<Flaky>> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let value = fetch_with_retry(&config, &cancel, || async { Ok::<_, Flaky>(42) }).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, server busy, connection reset) should return `true`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Why [`fetch_with_retry`] stopped without a value
#[derive(Debug)]
pub enum RetryError<E> {
    /// The retry budget ran out; `last` is the final error
    Exhausted {
        /// Total attempts made, including the first
        attempts: u32,
        /// Error from the last attempt
        last: E,
    },
    /// The operation returned an error that is not worth retrying
    Permanent {
        /// Total attempts made, including the first
        attempts: u32,
        /// The non-retryable error
        error: E,
    },
    /// The cancellation token fired
    Cancelled {
        /// Attempts started before cancellation
        attempts: u32,
    },
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            RetryError::Permanent { error, .. } => write!(f, "{}", error),
            RetryError::Cancelled { attempts } => {
                write!(f, "cancelled after {} attempts", attempts)
            }
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

/// Execute an async operation with exponential backoff until it succeeds
///
/// Each attempt and each backoff sleep races `cancel`, so a stalled request or
/// a long delay never outlives the run.
///
/// # Arguments
///
/// * `config` - Retry configuration (attempt bound, delays, backoff multiplier, jitter)
/// * `cancel` - Token that aborts the loop
/// * `operation` - Async closure that returns `Result<T, E>` where `E` implements [`IsRetryable`]
pub async fn fetch_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut retries: u32 = 0;
    let mut delay = config.initial_delay;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled {
                attempts: retries,
            });
        }

        let outcome = tokio::select! {
            outcome = operation() => outcome,
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled {
                    attempts: retries + 1,
                });
            }
        };

        let error = match outcome {
            Ok(value) => {
                if retries > 0 {
                    tracing::debug!(attempts = retries + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            return Err(RetryError::Permanent {
                attempts: retries + 1,
                error,
            });
        }

        if config.max_attempts.is_some_and(|max| retries >= max) {
            return Err(RetryError::Exhausted {
                attempts: retries + 1,
                last: error,
            });
        }

        retries += 1;

        let wait = if config.jitter {
            add_jitter(delay)
        } else {
            delay
        };

        tracing::debug!(
            error = %error,
            attempt = retries,
            delay_ms = wait.as_millis() as u64,
            "Operation failed, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled { attempts: retries });
            }
        }

        delay = next_delay(delay, config);
    }
}

/// Grow `delay` by the backoff multiplier, capped at `max_delay`
///
/// A product that is not a representable duration (overflow, NaN) saturates
/// at `max_delay`.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .map_or(config.max_delay, |next| next.min(config.max_delay))
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
