//! # Retry backoff for failed job attempts.
//!
//! [`RetryBackoff`] controls how long a worker waits before the next attempt.
//! It is parameterized by:
//! - [`RetryBackoff::delay`] the base delay;
//! - [`RetryBackoff::step`] the amount added per failed attempt;
//! - [`RetryBackoff::max`] the cap.
//!
//! The delay after attempt `n` (1-based) is `min(delay + step × n, max)`,
//! then jitter is applied. Growth is linear, so the base for an attempt never
//! depends on what jitter produced for the previous one.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::{JitterPolicy, RetryBackoff};
//!
//! let backoff = RetryBackoff {
//!     delay: Duration::from_millis(100),
//!     step: Duration::from_millis(50),
//!     max: Duration::from_millis(300),
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(1), Duration::from_millis(150));
//! assert_eq!(backoff.next(2), Duration::from_millis(200));
//! assert_eq!(backoff.next(10), Duration::from_millis(300));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Linear retry backoff with a cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryBackoff {
    /// Base delay before a retry.
    pub delay: Duration,
    /// Added once per failed attempt.
    pub step: Duration,
    /// Upper bound of the delay (before jitter).
    pub max: Duration,
    /// Randomization applied to the capped delay.
    pub jitter: JitterPolicy,
}

impl Default for RetryBackoff {
    /// Returns `delay = 100ms`, `step = 100ms`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(100),
            step: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: JitterPolicy::None,
        }
    }
}

impl RetryBackoff {
    /// Backoff that never waits.
    pub const fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            step: Duration::ZERO,
            max: Duration::ZERO,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after the given failed attempt (1-based).
    ///
    /// Saturates instead of overflowing for huge attempt numbers.
    pub fn next(&self, attempt: u32) -> Duration {
        let grown = self
            .step
            .checked_mul(attempt)
            .and_then(|inc| self.delay.checked_add(inc))
            .unwrap_or(Duration::MAX);
        self.jitter.apply(grown.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(delay: u64, step: u64, max: u64) -> RetryBackoff {
        RetryBackoff {
            delay: Duration::from_millis(delay),
            step: Duration::from_millis(step),
            max: Duration::from_millis(max),
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_linear_growth() {
        let policy = linear(100, 100, 10_000);
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(300));
        assert_eq!(policy.next(5), Duration::from_millis(600));
    }

    #[test]
    fn test_zero_step_is_constant() {
        let policy = linear(250, 0, 10_000);
        for attempt in 1..10 {
            assert_eq!(policy.next(attempt), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_clamped_to_max() {
        let policy = linear(100, 1_000, 1_500);
        assert_eq!(policy.next(1), Duration::from_millis(1_100));
        assert_eq!(policy.next(2), Duration::from_millis(1_500));
    }

    #[test]
    fn test_delay_above_max_is_capped() {
        let policy = linear(5_000, 0, 1_000);
        assert_eq!(policy.next(1), Duration::from_millis(1_000));
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let policy = RetryBackoff {
            delay: Duration::from_secs(1),
            step: Duration::MAX,
            max: Duration::from_secs(60),
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_immediate_never_waits() {
        let policy = RetryBackoff::immediate();
        assert_eq!(policy.next(1), Duration::ZERO);
        assert_eq!(policy.next(1_000), Duration::ZERO);
    }

    #[test]
    fn test_full_jitter_bounds() {
        let policy = RetryBackoff {
            jitter: JitterPolicy::Full,
            ..linear(1_000, 0, 30_000)
        };
        for attempt in 1..50 {
            assert!(policy.next(attempt) <= Duration::from_millis(1_000));
        }
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let policy = RetryBackoff {
            jitter: JitterPolicy::Equal,
            ..linear(1_000, 0, 30_000)
        };
        for attempt in 1..50 {
            let delay = policy.next(attempt);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1_000));
        }
    }
}
