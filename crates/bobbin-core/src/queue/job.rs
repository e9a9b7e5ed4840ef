//! Type-erased queue entries.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::abortable::abortable;
use crate::error::TaskError;
use crate::ids::TaskId;
use crate::timeout::with_timeout;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What a finished job reports back to the queue.
///
/// `deliver` hands the typed result to the caller's handle; the queue calls it
/// only after its own bookkeeping for the job is done.
pub(crate) struct Settlement {
    pub error: Option<String>,
    pub deliver: Box<dyn FnOnce() + Send>,
}

/// A pending unit of work, owned by the queue until dequeued.
pub(crate) struct Job {
    pub task_id: TaskId,
    pub cancel: Option<CancellationToken>,
    pub run: Box<dyn FnOnce() -> BoxFuture<Settlement> + Send>,
}

impl Job {
    pub fn new<F, Fut, T, E>(
        task_id: TaskId,
        task: F,
        cancel: Option<CancellationToken>,
        timeout: Option<Duration>,
        tx: oneshot::Sender<Result<T, TaskError<E>>>,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let token = cancel.clone();
        let run = Box::new(move || -> BoxFuture<Settlement> {
            Box::pin(async move {
                // building the future runs under the unwind guard too
                let outcome = execute(async move { task().await }, token, timeout).await;
                if matches!(outcome, Err(TaskError::Panicked)) {
                    tracing::warn!(%task_id, "task panicked");
                }
                let error = outcome.as_ref().err().map(ToString::to_string);
                Settlement {
                    error,
                    deliver: Box::new(move || {
                        // receiver gone: nobody is waiting for this result
                        let _ = tx.send(outcome);
                    }),
                }
            })
        });
        Self {
            task_id,
            cancel,
            run,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Run one task under its timeout and cancellation token.
async fn execute<Fut, T, E>(
    work: Fut,
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
) -> Result<T, TaskError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    let guarded = AssertUnwindSafe(work).catch_unwind();
    let timed = async move {
        match timeout {
            Some(after) => with_timeout(guarded, after).await.map_err(TaskError::from),
            None => Ok(guarded.await),
        }
    };
    let finished = match cancel {
        Some(token) => abortable(timed, &token)
            .await
            .unwrap_or(Err(TaskError::Cancelled)),
        None => timed.await,
    };

    match finished {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(TaskError::Operation(e)),
        Ok(Err(_panic)) => Err(TaskError::Panicked),
        Err(e) => Err(e),
    }
}
