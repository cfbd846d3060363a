//! Bounded retry loop for external calls.
//!
//! Only [`ExternalError::RateLimited`] and [`ExternalError::Timeout`] are
//! retried. Everything else, including network failures, is returned after
//! the first attempt.

use std::future::Future;
use std::time::Duration;

use peerscope_core::ExternalError;

use crate::policy::RetryPolicy;

/// Delay before the next attempt, or `None` if `err` is not retried here.
fn retry_delay(err: &ExternalError, policy: &RetryPolicy, retries_so_far: u32) -> Option<Duration> {
    match err {
        ExternalError::RateLimited { .. } => Some(policy.rate_limit_backoff.delay(retries_so_far)),
        ExternalError::Timeout { .. } => Some(policy.timeout_delay),
        _ => None,
    }
}

/// Stamps the final attempt count onto an exhausted retriable error.
fn with_attempts(err: ExternalError, attempts: u32) -> ExternalError {
    match err {
        ExternalError::RateLimited { target, .. } => ExternalError::RateLimited { target, attempts },
        ExternalError::Timeout { target, .. } => ExternalError::Timeout { target, attempts },
        other => other,
    }
}

/// Runs `operation` until it succeeds, fails terminally, or has been retried
/// `policy.max_retries` times.
///
/// With `max_retries = 3` the operation runs at most 4 times. The returned
/// error for an exhausted retry carries the total attempt count.
///
/// # Errors
///
/// Returns the last [`ExternalError`] produced by `operation`.
pub async fn call_with_retry<T, F, Fut>(
    target: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ExternalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExternalError>>,
{
    let mut retries = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Some(delay) = retry_delay(&err, policy, retries) else {
            return Err(err);
        };
        if retries >= policy.max_retries {
            let err = with_attempts(err, retries + 1);
            tracing::error!(service = target, attempts = retries + 1, error = %err, "giving up after retries");
            return Err(err);
        }

        retries += 1;
        #[allow(clippy::cast_possible_truncation)]
        let delay_ms = delay.as_millis() as u64;
        tracing::warn!(
            service = target,
            attempt = retries,
            max_retries = policy.max_retries,
            delay_ms,
            error = %err,
            "transient failure, retrying after back-off"
        );
        tokio::time::sleep(delay).await;
    }
}
