//! Async driver on top of the callback-style controller.

use std::fmt::Display;
use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{RetryError, RetryOperation};

impl<E> RetryOperation<E>
where
    E: Clone + Display + Send + 'static,
{
    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// `op` receives the attempt number (0 for the first call). Delays between
    /// attempts follow the policy, and `on_error` fires as usual.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.drive(op, None).await
    }

    /// Like [`run`](Self::run), but gives up with [`RetryError::Cancelled`]
    /// once `token` fires, whether an attempt is running or a retry is
    /// scheduled. The session is stopped in that case.
    pub async fn run_with_cancel<T, F, Fut>(
        &self,
        op: F,
        token: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.drive(op, Some(token)).await
    }

    async fn drive<T, F, Fut>(
        &self,
        mut op: F,
        token: Option<&CancellationToken>,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // The stored operation only signals "attempt n is due"; the sender
        // goes away when the session drops its operation.
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.attempt(move |attempt| {
            let _ = tx.send(attempt);
        });

        loop {
            let attempt = tokio::select! {
                biased;
                _ = cancelled(token) => {
                    self.stop();
                    return Err(RetryError::Cancelled);
                }
                next = rx.recv() => match next {
                    Some(attempt) => attempt,
                    None => return Err(RetryError::Stopped),
                },
            };

            let outcome = tokio::select! {
                biased;
                _ = cancelled(token) => {
                    self.stop();
                    return Err(RetryError::Cancelled);
                }
                outcome = op(attempt) => outcome,
            };

            match outcome {
                Ok(value) => {
                    self.retry(None);
                    return Ok(value);
                }
                Err(error) => {
                    if self.retry(Some(error)) {
                        continue;
                    }
                    // history is left in place for inspection
                    return Err(match self.final_error() {
                        Some(error) => RetryError::Exhausted {
                            attempts: self.attempts(),
                            error,
                        },
                        None => RetryError::Stopped,
                    });
                }
            }
        }
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
