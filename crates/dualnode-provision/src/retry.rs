//! Bounded-attempt retry helper.
//!
//! Wireless reads can transiently return nothing while the device is still
//! populating its scan buffer. This helper retries such operations a fixed
//! number of times with a fixed inter-attempt delay — never an unbounded
//! loop — and aborts early when the session is cancelled.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ProvisionError;

/// Run `op` up to `attempts` times, sleeping `delay` between attempts.
///
/// `op` receives the 1-based attempt number and returns `Ok(Some(value))`
/// on success, `Ok(None)` to request a retry, or `Err` to abort
/// immediately with that error.
///
/// # Errors
///
/// Returns [`ProvisionError::Cancelled`] if `cancel` fires during an
/// inter-attempt delay, the error produced by the final exhausted attempt
/// via `on_exhausted`, or any error `op` returned directly.
pub async fn bounded_retry<T, F, Fut>(
    attempts: u32,
    delay: Duration,
    cancel: &CancellationToken,
    mut op: F,
    on_exhausted: impl FnOnce(u32) -> ProvisionError,
) -> Result<T, ProvisionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, ProvisionError>>,
{
    debug_assert!(attempts > 0);
    for attempt in 1..=attempts {
        match op(attempt).await? {
            Some(value) => return Ok(value),
            None => {
                debug!(attempt, attempts, "attempt yielded nothing");
                if attempt < attempts {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(ProvisionError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
    Err(on_exhausted(attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_on_first_attempt() {
        let cancel = CancellationToken::new();
        let result = bounded_retry(
            3,
            Duration::from_millis(1),
            &cancel,
            |_| async { Ok(Some(42)) },
            |attempts| ProvisionError::ScanFailed { attempts },
        )
        .await
        .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result = bounded_retry(
            3,
            Duration::from_millis(1),
            &cancel,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok((attempt == 3).then_some("ok")) }
            },
            |attempts| ProvisionError::ScanFailed { attempts },
        )
        .await
        .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_exactly_n_attempts() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let err = bounded_retry(
            3,
            Duration::from_millis(1),
            &cancel,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(None::<u32>) }
            },
            |attempts| ProvisionError::ScanFailed { attempts },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProvisionError::ScanFailed { attempts: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_hard_error_aborts_immediately() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let err = bounded_retry(
            3,
            Duration::from_millis(1),
            &cancel,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<Option<u32>, _>(ProvisionError::Transport(
                        crate::error::TransportError::SessionInvalidated,
                    ))
                }
            },
            |attempts| ProvisionError::ScanFailed { attempts },
        )
        .await
        .unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_delay() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = bounded_retry(
            3,
            Duration::from_secs(60),
            &cancel,
            |_| async { Ok(None::<u32>) },
            |attempts| ProvisionError::ScanFailed { attempts },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Cancelled));
    }
}
