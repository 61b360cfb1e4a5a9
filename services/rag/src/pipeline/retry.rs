//! services/rag/src/pipeline/retry.rs
//!
//! Bounded retry with exponential backoff for transient generation-capability
//! failures (rate limits, network blips). Anything in the error taxonomy
//! other than `Unexpected` is considered permanent and returned immediately.

use smartlearn_core::ports::{PortError, PortResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

fn is_transient(error: &PortError) -> bool {
    matches!(error, PortError::Unexpected(_))
}

/// Runs `operation` up to `attempts` times, doubling the delay between
/// transient failures. The final error is returned unchanged.
pub async fn with_backoff<T, F, Fut>(attempts: u32, mut operation: F) -> PortResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PortResult<T>>,
{
    let attempts = attempts.max(1);
    let mut delay = INITIAL_BACKOFF;

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt < attempts => {
                warn!(attempt, error = %e, "Transient generation failure, backing off");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("retry loop always returns on the final attempt");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PortError::Unexpected("rate limited".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_the_budget_returns_the_last_error() {
        let calls = AtomicU32::new(0);
        let result: PortResult<()> = with_backoff(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PortError::Unexpected("still down".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(PortError::Unexpected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: PortResult<()> = with_backoff(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(PortError::MalformedOutput(
                    "no JSON array in output".to_string(),
                ))
            }
        })
        .await;

        assert!(matches!(result, Err(PortError::MalformedOutput(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
