use super::{FailureClass, LookupFailure};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry budget and delays for one package lookup.
///
/// All durations are stored in milliseconds so they read naturally in
/// `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum lookup attempts per package, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fixed wait after the service signals a rate limit.
    pub rate_limit_cooldown_ms: u64,
    /// Upper bound (exclusive) of the random jitter added to backoff delays.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
            rate_limit_cooldown_ms: 10_000,
            jitter_ms: 500,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.config.rate_limit_cooldown_ms)
    }

    /// Decides whether another attempt is allowed.
    ///
    /// `attempts_made` counts the attempts already issued, including the one
    /// that just failed. The backoff exponent is the 0-indexed number of that
    /// failed attempt, so the first transient failure waits `base_delay`.
    pub fn decide(&self, attempts_made: u32, failure: &LookupFailure) -> RetryDecision {
        if attempts_made >= self.config.max_attempts {
            return RetryDecision::GiveUp;
        }

        match failure.class() {
            FailureClass::Fatal => RetryDecision::GiveUp,
            FailureClass::RateLimited => RetryDecision::Retry(self.rate_limit_cooldown()),
            FailureClass::Transient => {
                let k = attempts_made.saturating_sub(1);
                RetryDecision::Retry(self.backoff_delay(k) + self.jitter())
            }
        }
    }

    /// `min(max_delay, base_delay * 2^k)`, without jitter.
    pub fn backoff_delay(&self, k: u32) -> Duration {
        let factor = 2u64.saturating_pow(k);
        let millis = self
            .config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Uniform sample from `[0, jitter_ms)`.
    pub fn jitter(&self) -> Duration {
        if self.config.jitter_ms == 0 {
            return Duration::ZERO;
        }
        let upper = self.config.jitter_ms.saturating_mul(1_000_000);
        Duration::from_nanos(rand::rng().random_range(0..upper))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 5_000);
        assert_eq!(config.rate_limit_cooldown_ms, 10_000);
        assert_eq!(config.jitter_ms, 500);
    }

    #[test]
    fn test_backoff_delay_doubles_until_capped() {
        let policy = policy();
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2_000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4_000));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(5_000));
        assert_eq!(policy.backoff_delay(63), Duration::from_millis(5_000));
        assert_eq!(policy.backoff_delay(200), Duration::from_millis(5_000));
    }

    #[test]
    fn test_transient_delay_within_jitter_bounds() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            ..RetryConfig::default()
        });

        for attempts_made in 1..=6u32 {
            let base = policy.backoff_delay(attempts_made - 1);
            for _ in 0..50 {
                match policy.decide(attempts_made, &LookupFailure::Timeout) {
                    RetryDecision::Retry(delay) => {
                        assert!(delay >= base);
                        assert!(delay < base + Duration::from_millis(500));
                    }
                    RetryDecision::GiveUp => panic!("expected retry"),
                }
            }
        }
    }

    #[test]
    fn test_rate_limit_delay_is_fixed() {
        let policy = policy();
        for attempts_made in 1..3 {
            assert_eq!(
                policy.decide(attempts_made, &LookupFailure::RateLimited),
                RetryDecision::Retry(Duration::from_secs(10))
            );
        }
    }

    #[test]
    fn test_fatal_never_retried() {
        let policy = policy();
        assert_eq!(
            policy.decide(1, &LookupFailure::Malformed("eof".into())),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_budget_exhaustion_wins() {
        let policy = policy();
        assert_eq!(policy.decide(3, &LookupFailure::RateLimited), RetryDecision::GiveUp);
        assert_eq!(policy.decide(3, &LookupFailure::Timeout), RetryDecision::GiveUp);
        assert_eq!(policy.decide(4, &LookupFailure::Http(500)), RetryDecision::GiveUp);
    }

    #[test]
    fn test_zero_jitter() {
        let policy = RetryPolicy::new(RetryConfig {
            jitter_ms: 0,
            ..RetryConfig::default()
        });
        assert_eq!(policy.jitter(), Duration::ZERO);
        assert_eq!(
            policy.decide(2, &LookupFailure::Network("reset".into())),
            RetryDecision::Retry(Duration::from_millis(1_000))
        );
    }
}
