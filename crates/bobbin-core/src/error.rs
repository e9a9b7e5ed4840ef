use std::time::Duration;

use thiserror::Error;

use crate::abortable::Cancelled;
use crate::timeout::TimedOut;

/// Invalid constructor or setter arguments. Always returned synchronously.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("concurrency must be a positive whole number or unbounded (got {0})")]
    InvalidConcurrency(usize),

    #[error("default timeout must be greater than zero")]
    ZeroTimeout,

    #[error("event capacity must be greater than zero")]
    ZeroEventCapacity,

    #[error("backoff factor must be >= 1 (got {0})")]
    InvalidBackoffFactor(f64),

    #[error("max_attempts must be > 0")]
    ZeroMaxAttempts,
}

/// Why a queued task did not produce a value.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    /// The task's cancellation token fired before it settled.
    #[error("task was cancelled")]
    Cancelled,

    /// The task ran longer than its timeout and was abandoned.
    #[error("task timed out after {0:?}")]
    TimedOut(Duration),

    /// The task panicked while running.
    #[error("task panicked")]
    Panicked,

    /// The task's own error, passed through unchanged.
    #[error("{0}")]
    Operation(E),
}

impl<E> TaskError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, TaskError::TimedOut(_))
    }

    /// The operation's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            TaskError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<Cancelled> for TaskError<E> {
    fn from(_: Cancelled) -> Self {
        TaskError::Cancelled
    }
}

impl<E> From<TimedOut> for TaskError<E> {
    fn from(TimedOut(after): TimedOut) -> Self {
        TaskError::TimedOut(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_is_displayed_verbatim() {
        let err: TaskError<String> = TaskError::Operation("disk full".to_string());
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(err.into_operation().as_deref(), Some("disk full"));
    }

    #[test]
    fn wrapper_errors_convert() {
        let err: TaskError<String> = Cancelled.into();
        assert!(err.is_cancelled());

        let err: TaskError<String> = TimedOut(Duration::from_millis(5)).into();
        assert!(err.is_timed_out());
        assert!(err.into_operation().is_none());
    }
}
