//! Exponential backoff for transient collaborator failures.
//!
//! Shared by every outbound client (generation, retrieval, memory) so that
//! transport retries stay inside the collaborator and never leak into the
//! quality-control loop.

use std::time::Duration;

/// Errors that can tell whether another attempt might succeed.
pub trait Retryable {
    /// True for transient failures (network, throttling, 5xx).
    fn is_retryable(&self) -> bool;

    /// Provider-specified delay before the next attempt, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on errors whose [`Retryable::is_retryable`] is true.
/// Non-retryable errors are returned immediately. The wait before each retry
/// doubles, and is stretched to honour a provider `Retry-After` hint.
pub async fn with_retry<F, Fut, T, E>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempt >= max_retries {
                    return Err(e);
                }

                let wait = e.retry_after().map_or(backoff, |hint| hint.max(backoff));
                attempt += 1;
                tracing::warn!(
                    backend = backend_name,
                    attempt = attempt,
                    max_retries = max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<&str, LlmError> =
            with_retry(3, Duration::from_millis(10), "test", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(LlmError::Network("flaky".to_string()))
                } else {
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), LlmError> =
            with_retry(2, Duration::from_millis(10), "test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::Unavailable("down".to_string()))
            })
            .await;

        assert!(matches!(result, Err(LlmError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), LlmError> =
            with_retry(5, Duration::from_millis(10), "test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::Auth("bad key".to_string()))
            })
            .await;

        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let start = tokio::time::Instant::now();
        let result: Result<(), LlmError> =
            with_retry(3, Duration::from_millis(100), "test", || async {
                Err(LlmError::Network("down".to_string()))
            })
            .await;

        assert!(result.is_err());
        // 100 + 200 + 400
        assert!(start.elapsed() >= Duration::from_millis(700));
    }
}
