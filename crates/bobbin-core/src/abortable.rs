//! Cancellation wrappers around a single future.
//!
//! The signal is a [`CancellationToken`]: it can be queried, fires once, and
//! `cancelled()` gives a one-shot listener that deregisters when dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation was cancelled")]
pub struct Cancelled;

/// Race `fut` against `token`.
///
/// Rejects without polling `fut` if the token already fired. When the token
/// fires first, `fut` is dropped (abandoned); any side effects it already
/// performed stay.
pub async fn abortable<F: Future>(fut: F, token: &CancellationToken) -> Result<F::Output, Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        out = fut => Ok(out),
    }
}

/// Session state shared between [`cancellable`] and the future it wraps.
///
/// The wrapped work can change how cancellation is reported at any point
/// while it runs.
#[derive(Debug, Clone)]
pub struct CancelSession {
    reject_on_cancel: Arc<AtomicBool>,
}

impl CancelSession {
    fn new() -> Self {
        Self {
            reject_on_cancel: Arc::new(AtomicBool::new(true)),
        }
    }

    /// `false` makes cancellation resolve with `Ok(None)` instead of `Err(Cancelled)`.
    pub fn set_reject_on_cancel(&self, reject: bool) {
        self.reject_on_cancel.store(reject, Ordering::SeqCst);
    }

    pub fn rejects_on_cancel(&self) -> bool {
        self.reject_on_cancel.load(Ordering::SeqCst)
    }
}

/// Like [`abortable`], but the work is built with a [`CancelSession`] handle
/// that decides whether cancellation is an error.
pub async fn cancellable<B, Fut>(
    token: &CancellationToken,
    build: B,
) -> Result<Option<Fut::Output>, Cancelled>
where
    B: FnOnce(CancelSession) -> Fut,
    Fut: Future,
{
    let session = CancelSession::new();
    let fut = build(session.clone());
    match abortable(fut, token).await {
        Ok(out) => Ok(Some(out)),
        Err(Cancelled) if session.rejects_on_cancel() => Err(Cancelled),
        Err(Cancelled) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn already_cancelled_token_rejects_without_polling() {
        let token = CancellationToken::new();
        token.cancel();

        let mut polled = false;
        let result = abortable(
            async {
                polled = true;
            },
            &token,
        )
        .await;

        assert_eq!(result, Err(Cancelled));
        assert!(!polled);
    }

    #[tokio::test(start_paused = true)]
    async fn token_firing_mid_flight_abandons_future() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = abortable(tokio::time::sleep(Duration::from_secs(60)), &token).await;
        assert_eq!(result, Err(Cancelled));
    }

    #[tokio::test]
    async fn completes_when_token_never_fires() {
        let token = CancellationToken::new();
        assert_eq!(abortable(async { 7 }, &token).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn session_can_opt_out_of_rejection() {
        let token = CancellationToken::new();
        let trigger = token.clone();

        let result = cancellable(&token, |session| async move {
            session.set_reject_on_cancel(false);
            trigger.cancel();
            tokio::time::sleep(Duration::from_secs(1)).await;
            "done"
        })
        .await;

        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn session_rejects_by_default() {
        let token = CancellationToken::new();
        token.cancel();
        let result = cancellable(&token, |_session| async { 1 }).await;
        assert_eq!(result, Err(Cancelled));
    }
}
