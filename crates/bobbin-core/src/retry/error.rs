use std::time::Duration;

use thiserror::Error;

/// One entry in a retry session's error history.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryFailure<E> {
    /// The operation's own error.
    #[error("{0}")]
    Operation(E),

    /// The session ran past `max_elapsed`.
    #[error("retry deadline of {max_elapsed:?} exceeded after {elapsed:?}")]
    DeadlineExceeded {
        elapsed: Duration,
        max_elapsed: Duration,
    },
}

impl<E> RetryFailure<E> {
    pub fn is_deadline(&self) -> bool {
        matches!(self, RetryFailure::DeadlineExceeded { .. })
    }

    pub fn into_operation(self) -> Option<E> {
        match self {
            RetryFailure::Operation(e) => Some(e),
            RetryFailure::DeadlineExceeded { .. } => None,
        }
    }
}

/// Why [`RetryOperation::run`](super::RetryOperation::run) gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The cancellation token fired; the session was stopped.
    #[error("retry cancelled")]
    Cancelled,

    /// The session was stopped from elsewhere while waiting.
    #[error("retry session was stopped")]
    Stopped,

    /// Attempts or deadline exhausted. `error` is the deadline error when the
    /// deadline tripped, otherwise the session's dominant error.
    #[error("giving up after {attempts} retries: {error}")]
    Exhausted {
        attempts: u32,
        error: RetryFailure<E>,
    },
}

impl<E> RetryError<E> {
    pub fn into_failure(self) -> Option<RetryFailure<E>> {
        match self {
            RetryError::Exhausted { error, .. } => Some(error),
            _ => None,
        }
    }
}
