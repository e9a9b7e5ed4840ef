//! Backoff schedule and attempt budget for [`RetryOperation`](super::RetryOperation).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Backoff and budget settings for a retry session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt. `None` retries forever.
    pub max_attempts: Option<u32>,

    /// Delay before the first retry (before jitter).
    pub min_interval: Duration,

    /// Upper bound on any single delay. `None` is unbounded.
    pub max_interval: Option<Duration>,

    /// Give up once this much time has passed since the first attempt.
    pub max_elapsed: Option<Duration>,

    /// Multiplier applied per retry.
    pub backoff_factor: f64,

    /// Multiply the base delay by a random factor in `[1, 2)`.
    pub randomize: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            min_interval: Duration::from_secs(1),
            max_interval: None,
            max_elapsed: None,
            backoff_factor: 2.0,
            randomize: false,
        }
    }
}

impl RetryPolicy {
    /// Check the settings and normalize them.
    ///
    /// `min_interval > max_interval` is not an error: `max_interval` is raised
    /// to `min_interval`.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        // also catches NaN
        if !(self.backoff_factor >= 1.0) {
            return Err(ConfigError::InvalidBackoffFactor(self.backoff_factor));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if let Some(max) = self.max_interval
            && self.min_interval > max
        {
            self.max_interval = Some(self.min_interval);
        }
        Ok(self)
    }

    /// Delay before retry number `attempt` (0-indexed), or `None` once the
    /// attempt budget is used up.
    ///
    /// `delay = min(round(R * max(min_interval, 1ms)) * factor^attempt, max_interval)`
    /// where `R` is 1, or uniform in `[1, 2)` when `randomize` is set.
    ///
    /// Example with min_interval=100ms, factor=2.0:
    /// - attempt 0: 100ms
    /// - attempt 1: 200ms
    /// - attempt 2: 400ms
    /// - attempt 3: 800ms
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let jitter = if self.randomize {
            rand::random::<f64>() + 1.0
        } else {
            1.0
        };
        self.delay_with_jitter(attempt, jitter)
    }

    fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        let base_ms = millis(self.min_interval).max(1.0);
        let mut delay_ms = (jitter * base_ms).round() * self.backoff_factor.powf(f64::from(attempt));
        if let Some(max) = self.max_interval {
            delay_ms = delay_ms.min(millis(max));
        }
        Some(from_millis(delay_ms))
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}

/// Saturates instead of panicking on huge or non-finite values.
fn from_millis(ms: f64) -> Duration {
    let nanos = (ms * 1_000_000.0).round();
    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Duration::from_nanos(u64::MAX);
    }
    Duration::from_nanos(nanos.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn policy(min_ms: u64, factor: f64) -> RetryPolicy {
        RetryPolicy {
            min_interval: Duration::from_millis(min_ms),
            backoff_factor: factor,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn defaults_allow_ten_retries_doubling_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, Some(10));
        assert_eq!(policy.min_interval, Duration::from_secs(1));
        assert_eq!(policy.backoff_factor, 2.0);
        assert_eq!(policy.max_interval, None);
        assert_eq!(policy.max_elapsed, None);
        assert!(!policy.randomize);
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(10), None);
        assert!(policy.clone().validate().is_ok());
    }

    #[rstest]
    #[case(0, 100)]
    #[case(1, 200)]
    #[case(2, 400)]
    #[case(3, 800)]
    fn exponential_backoff(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = policy(100, 2.0);
        assert_eq!(
            policy.next_delay(attempt),
            Some(Duration::from_millis(expected_ms))
        );
    }

    #[test]
    fn delay_is_capped_by_max_interval() {
        let policy = RetryPolicy {
            max_interval: Some(Duration::from_millis(300)),
            ..policy(100, 2.0)
        };
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(300)));
        assert_eq!(policy.next_delay(9), Some(Duration::from_millis(300)));
    }

    #[test]
    fn zero_min_interval_counts_as_one_millisecond() {
        let policy = policy(0, 3.0);
        assert_eq!(policy.next_delay(0), Some(Duration::from_millis(1)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(9)));
    }

    #[test]
    fn budget_exhaustion_returns_none() {
        let policy = RetryPolicy {
            max_attempts: Some(3),
            ..policy(10, 2.0)
        };
        assert!(policy.next_delay(2).is_some());
        assert_eq!(policy.next_delay(3), None);
        assert_eq!(policy.next_delay(4), None);
    }

    #[test]
    fn unbounded_attempts_never_stop() {
        let policy = RetryPolicy {
            max_attempts: None,
            max_interval: Some(Duration::from_secs(30)),
            ..policy(10, 2.0)
        };
        assert_eq!(policy.next_delay(10_000), Some(Duration::from_secs(30)));
    }

    #[test]
    fn huge_exponent_saturates() {
        let policy = RetryPolicy {
            max_attempts: None,
            ..policy(10, 2.0)
        };
        assert_eq!(policy.next_delay(5_000), Some(Duration::from_nanos(u64::MAX)));
    }

    #[test]
    fn jitter_stays_within_one_to_two_times() {
        let policy = RetryPolicy {
            randomize: true,
            ..policy(100, 2.0)
        };
        for _ in 0..100 {
            let delay = policy.next_delay(1).unwrap();
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(400));
        }
        assert_eq!(
            policy.delay_with_jitter(1, 1.5),
            Some(Duration::from_millis(300))
        );
    }

    #[rstest]
    #[case(0.5)]
    #[case(0.0)]
    #[case(f64::NAN)]
    fn factor_below_one_is_rejected(#[case] factor: f64) {
        assert!(matches!(
            policy(100, factor).validate(),
            Err(ConfigError::InvalidBackoffFactor(_))
        ));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let policy = RetryPolicy {
            max_attempts: Some(0),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.validate(), Err(ConfigError::ZeroMaxAttempts));
    }

    #[test]
    fn min_above_max_raises_max() {
        let policy = RetryPolicy {
            max_interval: Some(Duration::from_millis(50)),
            ..policy(200, 2.0)
        }
        .validate()
        .unwrap();
        assert_eq!(policy.max_interval, Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(200)));
    }

    #[test]
    fn policy_loads_from_partial_json() {
        let policy: RetryPolicy = serde_json::from_str(
            r#"{ "max_attempts": 3, "min_interval": { "secs": 0, "nanos": 250000000 }, "randomize": true }"#,
        )
        .unwrap();
        assert_eq!(policy.max_attempts, Some(3));
        assert_eq!(policy.min_interval, Duration::from_millis(250));
        assert!(policy.randomize);
        assert_eq!(policy.backoff_factor, 2.0);
    }
}
