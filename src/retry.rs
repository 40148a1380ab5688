//! Bounded retry with a fixed delay, for transient resource contention.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Runs `op` up to `attempts` times, sleeping `delay` between failures.
///
/// Returns the first success, or the error from the final attempt. Intended
/// for operations that contend on transiently held OS resources, such as
/// deleting an index directory another handle still has open.
pub async fn retry_with_delay<T, E, F, Fut>(
    attempts: usize,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, attempts, error = %err, "retryable operation failed");
                last_err = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    // attempts >= 1, so at least one error was recorded
    Err(last_err.expect("retry loop ran at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> = retry_with_delay(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result: Result<&str, String> = retry_with_delay(3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("still locked".to_string())
                } else {
                    Ok("released")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "released");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_error_when_attempts_exhausted() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = retry_with_delay(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("locked".to_string()) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "locked");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
