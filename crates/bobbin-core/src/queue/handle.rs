use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::job::BoxFuture;
use crate::error::TaskError;
use crate::ids::TaskId;

/// Completion handle returned by [`TaskQueue::submit`](super::TaskQueue::submit).
///
/// Resolves exactly once with the task's value or a [`TaskError`]. A task with
/// a cancellation token rejects as soon as the token fires, even while it is
/// still waiting in the queue. A task discarded by `clear()` never resolves.
pub struct TaskHandle<T, E> {
    task_id: TaskId,
    inner: BoxFuture<Result<T, TaskError<E>>>,
}

impl<T, E> TaskHandle<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(
        task_id: TaskId,
        rx: oneshot::Receiver<Result<T, TaskError<E>>>,
        cancel: Option<CancellationToken>,
    ) -> Self {
        let inner = Box::pin(async move {
            let delivered = async move {
                match rx.await {
                    Ok(outcome) => outcome,
                    // dropped without running (cleared or abandoned queue)
                    Err(_) => std::future::pending().await,
                }
            };
            match cancel {
                Some(token) => tokio::select! {
                    biased;
                    outcome = delivered => outcome,
                    _ = token.cancelled() => Err(TaskError::Cancelled),
                },
                None => delivered.await,
            }
        });
        Self { task_id, inner }
    }
}

impl<T, E> TaskHandle<T, E> {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}
