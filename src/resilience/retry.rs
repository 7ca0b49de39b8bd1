//! Retry policies with exponential backoff.
//!
//! Completion clients add a uniformly distributed random jitter to each delay
//! so synchronized callers don't retry in lockstep; tool-execution clients
//! back off on the plain exponential curve.

use rand::Rng;
use std::time::Duration;

use crate::config::{CompletionRetrySettings, ToolRetrySettings};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Upper bound of the uniform jitter; `None` disables jitter.
    pub max_jitter: Option<Duration>,
}

impl RetryPolicy {
    /// Jittered policy for AI-completion clients.
    pub fn completion(settings: &CompletionRetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            max_jitter: Some(Duration::from_secs(settings.max_jitter_secs)),
        }
    }

    /// Plain exponential policy for tool-execution clients.
    pub fn tool(settings: &ToolRetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            max_jitter: None,
        }
    }

    /// Delay before the `retry`-th retry (1-based):
    /// `initial * 2^(retry-1)`, plus jitter in `[0, max_jitter]` when enabled.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let base_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let jitter_ms = match self.max_jitter {
            Some(max_jitter) if !max_jitter.is_zero() => {
                rand::thread_rng().gen_range(0..=max_jitter.as_millis() as u64)
            }
            _ => 0,
        };
        Duration::from_millis(base_ms.saturating_add(jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, jitter_ms: Option<u64>) -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(initial_ms),
            max_jitter: jitter_ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn test_tool_backoff_is_plain_exponential() {
        let policy = policy(100, None);
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_completion_backoff_stays_within_jitter_band() {
        let policy = policy(100, Some(50));
        for retry in 1..=4u32 {
            let base = 100u64 << (retry - 1);
            for _ in 0..50 {
                let delay = policy.backoff_delay(retry).as_millis() as u64;
                assert!(
                    (base..=base + 50).contains(&delay),
                    "retry {} delay {}ms outside [{}, {}]",
                    retry,
                    delay,
                    base,
                    base + 50
                );
            }
        }
    }

    #[test]
    fn test_jitter_actually_varies() {
        let policy = policy(10, Some(1_000));
        let first = policy.backoff_delay(1);
        let varied = (0..100).any(|_| policy.backoff_delay(1) != first);
        assert!(varied, "100 jittered delays were all identical");
    }

    #[test]
    fn test_large_retry_count_does_not_overflow() {
        let policy = policy(1_000, None);
        // Shift count beyond u64 width saturates rather than panicking.
        let delay = policy.backoff_delay(80);
        assert!(delay >= Duration::from_millis(1_000));
    }

    #[test]
    fn test_policy_constructors() {
        let completion = RetryPolicy::completion(&CompletionRetrySettings::default());
        assert_eq!(completion.max_retries, 3);
        assert_eq!(completion.max_jitter, Some(Duration::from_secs(5)));

        let tool = RetryPolicy::tool(&ToolRetrySettings::default());
        assert_eq!(tool.max_retries, 3);
        assert_eq!(tool.max_jitter, None);
    }
}
