//! Timeout wrappers around a single future.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Abandon `fut` and fail once `after` has elapsed.
pub async fn with_timeout<F: Future>(fut: F, after: Duration) -> Result<F::Output, TimedOut> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| TimedOut(after))
}

/// Abandon `fut` once `after` has elapsed and resolve with `fallback` instead.
pub async fn with_timeout_or<F: Future>(fut: F, after: Duration, fallback: F::Output) -> F::Output {
    match with_timeout(fut, after).await {
        Ok(out) => out,
        Err(TimedOut(after)) => {
            tracing::debug!(?after, "timed out, using fallback value");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_future_times_out() {
        let result = with_timeout(
            tokio::time::sleep(Duration::from_secs(10)),
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(result, Err(TimedOut(Duration::from_millis(50))));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_future_wins() {
        let result = with_timeout(async { "ok" }, Duration::from_millis(50)).await;
        assert_eq!(result, Ok("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_replaces_timeout_error() {
        let value = with_timeout_or(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                1
            },
            Duration::from_millis(50),
            -1,
        )
        .await;
        assert_eq!(value, -1);
    }
}
