use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Classifies an error as worth retrying or not. Malformed-input style
/// failures are deterministic and must report `false`; only genuinely
/// transient conditions (network, timeout, temporary signer outage) retry.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error,
{
    /// The caller's cancellation token fired before the operation finished.
    #[error("operation aborted before completion")]
    Aborted,
    #[error(transparent)]
    Operation(E),
}

/// Bounded retry with linear backoff. Attempt count and base delay are
/// caller-supplied so each external call point tunes its own policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op` up to `max_attempts` times, sleeping `base_delay * attempt`
    /// between transient failures. Non-transient errors propagate on first
    /// sight; exhausting attempts propagates the last observed error. The
    /// backoff sleep races the cancellation token so an aborted request
    /// leaves no retry loop running behind it.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Retryable + std::error::Error,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1u32;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Aborted);
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.base_delay * attempt;
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "transient failure, retrying in {:?}",
                        delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RetryError::Aborted),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(RetryError::Operation(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Error)]
    enum FakeError {
        #[error("transient")]
        Transient,
        #[error("permanent")]
        Permanent,
    }

    impl Retryable for FakeError {
        fn is_transient(&self) -> bool {
            matches!(self, FakeError::Transient)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_transient_failures_with_three_invocations() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let result = policy
            .run(&CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                std::future::ready(if n <= 2 { Err(FakeError::Transient) } else { Ok(n) })
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_and_propagates_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .run(&CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(FakeError::Transient))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(RetryError::Operation(FakeError::Transient))));
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .run(&CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(FakeError::Permanent))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Operation(FakeError::Permanent))));
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts_without_invoking() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .run(&cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(FakeError::Transient))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(result, Err(RetryError::Aborted)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_abandons_the_loop() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .run(&cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                std::future::ready(Err(FakeError::Transient))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Aborted)));
    }
}
