//! Bounded retry with backoff for rate-limited requests
//!
//! The policy is parameterized two ways: the error type decides whether an
//! attempt is retryable ([`IsRetryable::is_retryable`]), and it may supply a
//! server-provided wait ([`IsRetryable::retry_after_hint`], fed by a 429's
//! `Retry-After` header). When no hint is present the delay falls back to
//! exponential backoff with optional jitter.

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (rate limiting, timeouts, connection resets) should
/// return `true`. Permanent failures (bad token, 404, disk full) should
/// return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Server-provided wait before the next attempt, if the error carries one
    ///
    /// When present this overrides the computed exponential backoff.
    fn retry_after_hint(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Non-success statuses other than 429 are logged, never retried
            Error::Api { .. } | Error::Download { .. } => false,
            Error::Config { .. } | Error::Serialization(_) | Error::InvalidUrl(_) => false,
        }
    }

    fn retry_after_hint(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Execute an async operation, retrying transient failures up to the budget
///
/// Returns the successful result, or the last error once the error is
/// permanent or `max_attempts` retries have been spent.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.default_retry_after;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                let wait = match e.retry_after_hint() {
                    Some(hint) => hint,
                    None if config.jitter => add_jitter(delay),
                    None => delay,
                };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    "request failed, retrying"
                );

                tokio::time::sleep(wait).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "request failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "request failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to spread out concurrent retries
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual wait is between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
