// Retry with exponential backoff for flaky external calls (LLM, search)

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Run `operation` up to `max_attempts` times, doubling the delay after each
/// failure (capped at 32x `initial_delay`). An error `should_retry` rejects is
/// returned at once; otherwise the last error is returned.
pub async fn with_retry<F, Fut, T, E, P>(
    mut operation: F,
    max_attempts: u32,
    initial_delay: Duration,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                attempt += 1;
                if attempt >= max_attempts.max(1) || !should_retry(&error) {
                    return Err(error);
                }

                let delay = initial_delay * 2u32.pow((attempt - 1).min(5));
                warn!(attempt, error = %error, delay_ms = delay.as_millis() as u64, "Retrying after failure");
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32, String> = with_retry(
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("attempt {n} failed")) } else { Ok(n) }
            },
            3,
            Duration::from_millis(1),
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), String> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            2,
            Duration::from_millis(1),
            |_| true,
        )
        .await;

        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), String> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("invalid api key".to_string())
            },
            3,
            Duration::from_millis(1),
            |e: &String| !e.contains("invalid"),
        )
        .await;

        assert_eq!(result, Err("invalid api key".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
