//! Per-provider retry policy with exponential backoff.

use std::time::Duration;

use rand::Rng;

/// How many times a single provider is tried, and how long to wait between
/// tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for one provider, including the first (>= 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay, including server-suggested ones.
    pub max_delay: Duration,
    /// Ceiling on one attempt; exceeding it counts as a timeout failure.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Handy in tests.
    pub fn immediate(max_attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            attempt_timeout,
        }
    }

    /// Delay before retry number `retry` (0-based), honoring a provider's
    /// `retry_after` hint when present. Never exceeds `max_delay`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => backoff_delay(self, retry),
        }
    }
}

/// Exponential backoff with +/-25% jitter, floored at `min(base, 100ms)`.
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base_ms = policy.base_delay.as_millis() as u64;
    let max_ms = policy.max_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let capped_ms = exp_ms.min(max_ms);

    let jitter_range = capped_ms / 4; // 25%
    let jitter = if jitter_range > 0 {
        let offset = rand::thread_rng().gen_range(0..=jitter_range.saturating_mul(2));
        offset as i64 - jitter_range as i64
    } else {
        0
    };
    let floor_ms = base_ms.min(100) as i64;
    let delay_ms = (capped_ms as i64 + jitter).max(floor_ms) as u64;
    Duration::from_millis(delay_ms.min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_stays_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(8000),
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let first = backoff_delay(&policy, 0);
            assert!(first >= Duration::from_millis(750) && first <= Duration::from_millis(1250));

            let late = backoff_delay(&policy, 10);
            assert!(late <= Duration::from_millis(8000));
            assert!(late >= Duration::from_millis(6000));
        }
    }

    #[test]
    fn zero_base_means_no_wait() {
        let policy = RetryPolicy::immediate(3, Duration::from_secs(1));
        assert_eq!(backoff_delay(&policy, 0), Duration::ZERO);
        assert_eq!(backoff_delay(&policy, 5), Duration::ZERO);
    }

    #[test]
    fn retry_after_hint_is_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(5),
            ..RetryPolicy::default()
        };
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(60))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
    }
}
