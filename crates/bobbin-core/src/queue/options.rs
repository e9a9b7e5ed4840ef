//! Queue configuration and per-submission options.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;

/// Ceiling on the number of in-flight tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    Limited(usize),
    #[default]
    Unbounded,
}

impl Concurrency {
    pub fn validate(self) -> Result<Self, ConfigError> {
        match self {
            Concurrency::Limited(0) => Err(ConfigError::InvalidConcurrency(0)),
            other => Ok(other),
        }
    }

    /// Can another task start while `in_flight` are running?
    pub(crate) fn has_room(self, in_flight: usize) -> bool {
        match self {
            Concurrency::Limited(limit) => in_flight < limit,
            Concurrency::Unbounded => true,
        }
    }
}

/// Queue-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub concurrency: Concurrency,

    /// Applied to every task that does not carry its own timeout.
    pub default_timeout: Option<Duration>,

    /// `false` creates the queue paused; call `start()` to begin draining.
    pub autostart: bool,

    /// Buffer size of the lifecycle event channel. Slow subscribers lag.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::Unbounded,
            default_timeout: None,
            autostart: true,
            event_capacity: 256,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.concurrency.validate()?;
        if self.default_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        Ok(())
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Concurrency::Limited(limit);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn paused(mut self) -> Self {
        self.autostart = false;
        self
    }
}

/// Options for a single submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Higher runs sooner. Equal priorities run in submission order.
    pub priority: i32,
    pub cancel: Option<CancellationToken>,
    /// Overrides the queue's default timeout.
    pub timeout: Option<Duration>,
}

impl SubmitOptions {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// How [`TaskQueue::submit_all`](super::TaskQueue::submit_all) reports a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Wait for every task and report each outcome. Never fails as a whole.
    #[default]
    SettleAll,
    /// Fail with the first error (in settle order) as soon as it happens.
    /// Other tasks keep running.
    FailFast,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Concurrency::Limited(1), true)]
    #[case(Concurrency::Limited(64), true)]
    #[case(Concurrency::Unbounded, true)]
    #[case(Concurrency::Limited(0), false)]
    fn concurrency_validation(#[case] concurrency: Concurrency, #[case] valid: bool) {
        assert_eq!(concurrency.validate().is_ok(), valid);
    }

    #[test]
    fn has_room_respects_limit() {
        assert!(Concurrency::Limited(2).has_room(1));
        assert!(!Concurrency::Limited(2).has_room(2));
        assert!(Concurrency::Unbounded.has_room(usize::MAX - 1));
    }

    #[test]
    fn default_config_is_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.autostart);
        assert_eq!(config.concurrency, Concurrency::Unbounded);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = QueueConfig::default().with_default_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn config_loads_from_partial_json() {
        let config: QueueConfig =
            serde_json::from_str(r#"{ "concurrency": { "limited": 4 }, "autostart": false }"#)
                .unwrap();
        assert_eq!(config.concurrency, Concurrency::Limited(4));
        assert!(!config.autostart);
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.default_timeout, None);
    }

    #[test]
    fn unbounded_parses_from_plain_string() {
        let config: QueueConfig = serde_json::from_str(r#"{ "concurrency": "unbounded" }"#).unwrap();
        assert_eq!(config.concurrency, Concurrency::Unbounded);
    }
}
