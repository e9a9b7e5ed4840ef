//! Retry controller: drives one operation through backoff-spaced attempts.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::{RetryFailure, RetryPolicy, RetryState};
use crate::error::ConfigError;
use crate::sync::lock;

type AttemptFn = Arc<dyn Fn(u32) + Send + Sync>;
type ErrorHook<E> = Arc<dyn Fn(&RetryFailure<E>, u32, Duration) + Send + Sync>;
type IntervalFn = Arc<dyn Fn(u32) -> Option<Duration> + Send + Sync>;

/// Mutable state of one retry session.
struct Session<E> {
    state: RetryState,
    attempts: u32,
    started_at: Option<Instant>,

    /// The operation re-invoked by the backoff timer.
    operation: Option<AttemptFn>,

    timer: Option<JoinHandle<()>>,

    /// Bumped whenever a scheduled retry is cancelled. A timer that already
    /// woke up compares its epoch before firing.
    epoch: u64,

    errors: Vec<RetryFailure<E>>,
    main_error: Option<RetryFailure<E>>,
    main_error_stale: bool,

    /// Set when the deadline tripped; reported instead of the dominant error.
    deadline_error: Option<RetryFailure<E>>,
}

impl<E> Session<E> {
    fn new() -> Self {
        Self {
            state: RetryState::Pending,
            attempts: 0,
            started_at: None,
            operation: None,
            timer: None,
            epoch: 0,
            errors: Vec::new(),
            main_error: None,
            main_error_stale: false,
            deadline_error: None,
        }
    }

    fn cancel_timer(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn record(&mut self, failure: RetryFailure<E>) {
        self.errors.push(failure);
        self.main_error_stale = true;
    }

    fn clear_history(&mut self) {
        self.errors.clear();
        self.main_error = None;
        self.main_error_stale = false;
    }

    /// Success, exhaustion or deadline: nothing will be re-invoked.
    fn finish(&mut self) {
        self.cancel_timer();
        self.operation = None;
        self.state = RetryState::Terminal;
    }
}

/// Retry controller for one logical call.
///
/// Cheap to clone; clones share the session, so the operation itself can hold
/// a clone and report each outcome through [`retry`](Self::retry).
///
/// # Example
/// ```ignore
/// let op = RetryOperation::<String>::new(RetryPolicy::default())?;
/// let handle = op.clone();
/// op.attempt(move |attempt| {
///     let result = do_work(attempt);
///     if handle.retry(result.err()) {
///         return; // another attempt is scheduled
///     }
///     // success, or give up with handle.final_error()
/// });
/// ```
pub struct RetryOperation<E> {
    policy: RetryPolicy,
    on_error: Option<ErrorHook<E>>,
    interval_fn: Option<IntervalFn>,
    session: Arc<Mutex<Session<E>>>,
}

impl<E> Clone for RetryOperation<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            on_error: self.on_error.clone(),
            interval_fn: self.interval_fn.clone(),
            session: Arc::clone(&self.session),
        }
    }
}

impl<E> fmt::Debug for RetryOperation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = lock(&self.session);
        f.debug_struct("RetryOperation")
            .field("policy", &self.policy)
            .field("state", &session.state)
            .field("attempts", &session.attempts)
            .field("errors", &session.errors.len())
            .finish_non_exhaustive()
    }
}

impl<E> RetryOperation<E>
where
    E: Clone + Display + Send + 'static,
{
    pub fn new(policy: RetryPolicy) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: policy.validate()?,
            on_error: None,
            interval_fn: None,
            session: Arc::new(Mutex::new(Session::new())),
        })
    }

    /// Called on every failure with `(error, attempt, next_delay)`.
    ///
    /// `next_delay` is zero when no further attempt follows. Runs outside the
    /// controller's lock, so it may call back into the controller.
    pub fn with_on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RetryFailure<E>, u32, Duration) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Replace the backoff formula. Returning `None` stops retrying.
    ///
    /// Runs while the controller's lock is held; it must not call back into
    /// the controller.
    pub fn with_interval_fn<F>(mut self, interval: F) -> Self
    where
        F: Fn(u32) -> Option<Duration> + Send + Sync + 'static,
    {
        self.interval_fn = Some(Arc::new(interval));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start the session: remember `op` and invoke it right away with the
    /// current attempt number.
    pub fn attempt<F>(&self, op: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let op: AttemptFn = Arc::new(op);
        let attempt = {
            let mut session = lock(&self.session);
            session.cancel_timer();
            session.started_at = Some(Instant::now());
            session.operation = Some(Arc::clone(&op));
            session.deadline_error = None;
            session.state = RetryState::AttemptInFlight;
            session.attempts
        };
        debug!(attempt, "retry session started");
        op(attempt);
    }

    /// Report the outcome of the latest attempt.
    ///
    /// `None` means success. Returns `true` when another attempt has been
    /// scheduled, `false` when the session is over (success, attempts
    /// exhausted, or deadline exceeded; see [`final_error`](Self::final_error)).
    /// Once the session is terminal, later reports are ignored until the next
    /// [`attempt`](Self::attempt) or [`reset`](Self::reset).
    pub fn retry(&self, error: Option<E>) -> bool {
        let mut session = lock(&self.session);
        if session.state.is_terminal() {
            trace!(attempt = session.attempts, "late report on a finished session ignored");
            return false;
        }
        let Some(error) = error else {
            session.finish();
            return false;
        };

        let attempt = session.attempts;
        let elapsed = session
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default();

        if let Some(max_elapsed) = self.policy.max_elapsed
            && elapsed >= max_elapsed
        {
            // the deadline error is what gets reported; history is dropped
            let deadline = RetryFailure::DeadlineExceeded {
                elapsed,
                max_elapsed,
            };
            session.clear_history();
            session.deadline_error = Some(deadline.clone());
            session.finish();
            drop(session);

            warn!(attempt, ?elapsed, ?max_elapsed, last_error = %error, "retry deadline exceeded");
            self.notify(&deadline, attempt, Duration::ZERO);
            return false;
        }

        let next = match &self.interval_fn {
            Some(interval) => interval(attempt),
            None => self.policy.next_delay(attempt),
        };
        let failure = RetryFailure::Operation(error);
        session.record(failure.clone());

        let Some(delay) = next else {
            session.finish();
            drop(session);

            warn!(attempt, error = %failure, "retry attempts exhausted");
            self.notify(&failure, attempt, Duration::ZERO);
            return false;
        };

        session.cancel_timer();
        let epoch = session.epoch;
        session.timer = Some(self.schedule(delay, epoch));
        session.state = RetryState::Waiting;
        drop(session);

        debug!(attempt, ?delay, error = %failure, "retry scheduled");
        self.notify(&failure, attempt, delay);
        true
    }

    /// Cancel any scheduled retry and forget the error history. Idempotent.
    pub fn stop(&self) {
        let mut session = lock(&self.session);
        session.clear_history();
        session.finish();
    }

    /// `stop()`, then zero the attempt counter so the controller can be reused.
    pub fn reset(&self) {
        let mut session = lock(&self.session);
        session.clear_history();
        session.finish();
        session.attempts = 0;
        session.deadline_error = None;
        session.state = RetryState::Pending;
    }

    /// The most frequent error message in the history; ties go to the error
    /// that most recently reached the top count. Cached until the history
    /// changes.
    pub fn main_error(&self) -> Option<RetryFailure<E>> {
        let mut session = lock(&self.session);
        if session.main_error_stale {
            let dominant = dominant_error(&session.errors);
            session.main_error = dominant;
            session.main_error_stale = false;
        }
        session.main_error.clone()
    }

    /// The error to report when the session gave up: the deadline error if
    /// the deadline tripped, otherwise [`main_error`](Self::main_error).
    pub fn final_error(&self) -> Option<RetryFailure<E>> {
        let deadline = lock(&self.session).deadline_error.clone();
        deadline.or_else(|| self.main_error())
    }

    /// Number of retries started so far (the first attempt is 0).
    pub fn attempts(&self) -> u32 {
        lock(&self.session).attempts
    }

    pub fn state(&self) -> RetryState {
        lock(&self.session).state
    }

    /// Error history in arrival order.
    pub fn errors(&self) -> Vec<RetryFailure<E>> {
        lock(&self.session).errors.clone()
    }

    fn notify(&self, failure: &RetryFailure<E>, attempt: u32, next: Duration) {
        if let Some(hook) = &self.on_error {
            hook(failure, attempt, next);
        }
    }

    /// Re-invoke the stored operation after `delay`, unless the session moved
    /// on (epoch changed) in the meantime.
    fn schedule(&self, delay: Duration, epoch: u64) -> JoinHandle<()> {
        let session = Arc::downgrade(&self.session);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = session.upgrade() else {
                return;
            };
            let fire = {
                let mut session = lock(&session);
                if session.epoch != epoch {
                    trace!(epoch, "stale retry timer ignored");
                    None
                } else {
                    session.timer = None;
                    session.attempts = session.attempts.saturating_add(1);
                    session.state = RetryState::AttemptInFlight;
                    let attempt = session.attempts;
                    session.operation.clone().map(|op| (op, attempt))
                }
            };
            if let Some((op, attempt)) = fire {
                op(attempt);
            }
        })
    }
}

/// Scan chronologically; a count that reaches or passes the leader's count
/// takes the lead.
fn dominant_error<E: Clone + Display>(errors: &[RetryFailure<E>]) -> Option<RetryFailure<E>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut leader: Option<(&RetryFailure<E>, usize)> = None;
    for failure in errors {
        let count = counts.entry(failure.to_string()).or_default();
        *count += 1;
        if leader.is_none_or(|(_, best)| *count >= best) {
            leader = Some((failure, *count));
        }
    }
    leader.map(|(failure, _)| failure.clone())
}
