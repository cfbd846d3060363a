use std::time::Duration;

/// Delay schedule applied between rate-limited attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed(Duration),
    /// `base × 2^retry`, where `retry` counts retries already made (0-based).
    Exponential { base: Duration },
}

impl Backoff {
    /// Delay before the retry following `retries_so_far` earlier retries.
    #[must_use]
    pub fn delay(&self, retries_so_far: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base } => {
                base.saturating_mul(1u32 << retries_so_far.min(16))
            }
        }
    }
}

/// How an [`crate::ExternalCallClient`] reacts to transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Delay schedule for HTTP 429.
    pub rate_limit_backoff: Backoff,
    /// Fixed delay before retrying a timed-out request.
    pub timeout_delay: Duration,
    /// Pause after every successful call, for APIs with a hard per-second quota.
    pub courtesy_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_backoff: Backoff::Exponential {
                base: Duration::from_secs(1),
            },
            timeout_delay: Duration::from_secs(2),
            courtesy_delay: None,
        }
    }
}

impl RetryPolicy {
    /// A policy with no delays at all, for tests.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            rate_limit_backoff: Backoff::Fixed(Duration::ZERO),
            timeout_delay: Duration::ZERO,
            courtesy_delay: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_from_base() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(1),
        };
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
    }

    #[test]
    fn exponential_backoff_saturates() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(u64::MAX / 2),
        };
        assert_eq!(backoff.delay(40), Duration::MAX);
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed(Duration::from_secs(10));
        assert_eq!(backoff.delay(0), backoff.delay(3));
    }
}
