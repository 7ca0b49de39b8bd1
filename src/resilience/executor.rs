//! Composition of breaker, retry, and cancellation around a provider call.
//!
//! The breaker (when the pool has one) gates the whole call before the first
//! attempt, so an open circuit stops retries from even starting. Each
//! attempt's outcome is still recorded so consecutive qualifying failures
//! trip the circuit regardless of which caller produced them. Cancellation is
//! checked between attempts and raced against both the in-flight attempt and
//! the backoff sleep; a cancelled attempt is dropped, which aborts the
//! underlying request.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::providers::ProviderCallError;

use super::circuit_breaker::CircuitBreaker;
use super::retry::RetryPolicy;

pub struct ResilienceExecutor {
    retry: RetryPolicy,
}

impl ResilienceExecutor {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `attempt` with retry, breaker bookkeeping, and cancellation.
    ///
    /// `attempt` is invoked once per try; transient failures are retried up
    /// to the policy's budget of additional attempts, everything else is
    /// classified and returned immediately.
    pub async fn execute<T, F, Fut>(
        &self,
        pool: &str,
        breaker: Option<&CircuitBreaker>,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderCallError>>,
    {
        if let Some(breaker) = breaker {
            if let Err(remaining) = breaker.try_acquire() {
                return Err(Error::CircuitOpen {
                    pool: pool.to_string(),
                    retry_in_ms: remaining.as_millis() as u64,
                });
            }
        }

        let mut attempts_made: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = attempt() => outcome,
            };
            attempts_made += 1;

            let error = match outcome {
                Ok(value) => {
                    if let Some(breaker) = breaker {
                        breaker.on_success();
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if let Some(breaker) = breaker {
                if error.trips_breaker() {
                    breaker.on_failure();
                }
            }

            if !error.is_retryable() {
                return Err(match error {
                    ProviderCallError::Status { status, message } => {
                        Error::Provider { status, message }
                    }
                    ProviderCallError::Malformed { status, message } => Error::Provider {
                        status,
                        message: format!("unreadable provider response: {}", message),
                    },
                    // Transport errors are always retryable and end up in the
                    // exhausted arm below instead.
                    ProviderCallError::Transport(e) => Error::TransientExhausted {
                        attempts: attempts_made,
                        message: e.to_string(),
                    },
                });
            }

            if attempts_made > self.retry.max_retries {
                return Err(Error::TransientExhausted {
                    attempts: attempts_made,
                    message: error.to_string(),
                });
            }

            let delay = self.retry.backoff_delay(attempts_made);
            tracing::debug!(
                pool,
                attempt = attempts_made,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient provider failure, backing off"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::{CircuitBreakerConfig, CircuitStatus};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn executor(max_retries: u32) -> ResilienceExecutor {
        ResilienceExecutor::new(RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(5),
            max_jitter: None,
        })
    }

    fn server_error() -> ProviderCallError {
        ProviderCallError::Status {
            status: 503,
            message: "upstream unavailable".into(),
        }
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let executor = executor(3);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = executor
            .execute("openai", None, &cancel, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(server_error())
                } else {
                    Ok(42u32)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retry_budget() {
        let executor = executor(2);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<u32, Error> = executor
            .execute("openai", None, &cancel, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            })
            .await;

        match result.unwrap_err() {
            Error::TransientExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected TransientExhausted, got {:?}", other),
        }
        // One initial attempt plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let executor = executor(5);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: Result<u32, Error> = executor
            .execute("openai", None, &cancel, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderCallError::Status {
                    status: 400,
                    message: "bad request".into(),
                })
            })
            .await;

        match result.unwrap_err() {
            Error::Provider { status, .. } => assert_eq!(status, 400),
            other => panic!("expected Provider, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let executor = executor(1);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = executor
            .execute("openai", None, &cancel, || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderCallError::Status {
                        status: 429,
                        message: "rate limited".into(),
                    })
                } else {
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_open_breaker_prevents_any_attempt() {
        let executor = executor(3);
        let breaker = CircuitBreaker::new(
            "openai",
            CircuitBreakerConfig::new(1, Duration::from_secs(60)),
        );
        breaker.on_failure();
        assert_eq!(breaker.snapshot().status, CircuitStatus::Open);

        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<u32, Error> = executor
            .execute("openai", Some(&breaker), &cancel, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;

        assert!(matches!(result.unwrap_err(), Error::CircuitOpen { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_attempt_failures_feed_the_breaker() {
        let executor = executor(2);
        let breaker = CircuitBreaker::new(
            "openai",
            CircuitBreakerConfig::new(3, Duration::from_secs(60)),
        );
        let cancel = CancellationToken::new();

        let _: Result<u32, Error> = executor
            .execute("openai", Some(&breaker), &cancel, || async {
                Err(server_error())
            })
            .await;

        // Three attempts, three qualifying failures: the circuit is open now.
        assert_eq!(breaker.snapshot().status, CircuitStatus::Open);
    }

    #[tokio::test]
    async fn test_non_qualifying_failures_leave_breaker_closed() {
        let executor = executor(0);
        let breaker = CircuitBreaker::new(
            "openai",
            CircuitBreakerConfig::new(1, Duration::from_secs(60)),
        );
        let cancel = CancellationToken::new();

        let _: Result<u32, Error> = executor
            .execute("openai", Some(&breaker), &cancel, || async {
                Err(ProviderCallError::Status {
                    status: 429,
                    message: "rate limited".into(),
                })
            })
            .await;

        assert_eq!(breaker.snapshot().status, CircuitStatus::Closed);
    }

    #[tokio::test]
    async fn test_cancellation_stops_retries_promptly() {
        let executor = ResilienceExecutor::new(RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_secs(30),
            max_jitter: None,
        });
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<u32, Error> = executor
            .execute("openai", None, &cancel, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            })
            .await;

        assert!(matches!(result.unwrap_err(), Error::Cancelled));
        // Cancelled during the first backoff, long before the 30s delay.
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
