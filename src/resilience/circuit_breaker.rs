//! Three-state circuit breaker shared by all calls against one pool.
//!
//! Closed counts consecutive qualifying failures; at the threshold the
//! circuit opens and calls fail fast for the break duration. The first
//! acquisition after the break elapses moves the circuit to half-open and is
//! admitted as the single trial call: its success closes the circuit, its
//! failure re-opens it with a fresh timer. All transitions happen under one
//! mutex, so no two transitions can apply out of order under concurrent
//! failures.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub break_duration: Duration,
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, break_duration: Duration) -> Self {
        Self {
            failure_threshold,
            break_duration,
        }
    }

    pub fn from_settings(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            break_duration: Duration::from_secs(settings.break_duration_secs),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
        }
    }
}

/// Point-in-time view for logging and metrics.
#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    /// Remaining open time, if currently open.
    pub open_remaining: Option<Duration>,
}

#[derive(Debug)]
struct State {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

pub struct CircuitBreaker {
    pool: String,
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(pool: impl Into<String>, cfg: CircuitBreakerConfig) -> Self {
        Self {
            pool: pool.into(),
            cfg,
            state: Mutex::new(State {
                status: CircuitStatus::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to start a call. `Err` carries the remaining break time when the
    /// circuit is open or a half-open trial is already in flight.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut st = self.lock();
        match st.status {
            CircuitStatus::Closed => Ok(()),
            CircuitStatus::Open => {
                let opened_at = st.opened_at.unwrap_or_else(Instant::now);
                let elapsed = opened_at.elapsed();
                if elapsed < self.cfg.break_duration {
                    Err(self.cfg.break_duration - elapsed)
                } else {
                    st.status = CircuitStatus::HalfOpen;
                    st.probe_in_flight = true;
                    tracing::info!(pool = %self.pool, "circuit half-open, trial call allowed");
                    Ok(())
                }
            }
            CircuitStatus::HalfOpen => {
                if st.probe_in_flight {
                    Err(Duration::ZERO)
                } else {
                    st.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call.
    pub fn on_success(&self) {
        let mut st = self.lock();
        match st.status {
            CircuitStatus::HalfOpen => {
                st.status = CircuitStatus::Closed;
                st.consecutive_failures = 0;
                st.opened_at = None;
                st.probe_in_flight = false;
                tracing::info!(pool = %self.pool, "circuit closed, normal operation resumed");
            }
            CircuitStatus::Closed => {
                st.consecutive_failures = 0;
            }
            // A success landing while open comes from a call admitted before
            // the trip; the break duration still governs reopening.
            CircuitStatus::Open => {}
        }
    }

    /// Record a qualifying failure (transport error or status >= 500).
    pub fn on_failure(&self) {
        let mut st = self.lock();
        match st.status {
            CircuitStatus::Closed => {
                st.consecutive_failures = st.consecutive_failures.saturating_add(1);
                if st.consecutive_failures >= self.cfg.failure_threshold {
                    st.status = CircuitStatus::Open;
                    st.opened_at = Some(Instant::now());
                    st.probe_in_flight = false;
                    tracing::warn!(
                        pool = %self.pool,
                        failures = st.consecutive_failures,
                        break_duration_ms = self.cfg.break_duration.as_millis() as u64,
                        "circuit opened"
                    );
                }
            }
            CircuitStatus::HalfOpen => {
                st.status = CircuitStatus::Open;
                st.opened_at = Some(Instant::now());
                st.probe_in_flight = false;
                tracing::warn!(
                    pool = %self.pool,
                    break_duration_ms = self.cfg.break_duration.as_millis() as u64,
                    "trial call failed, circuit re-opened"
                );
            }
            CircuitStatus::Open => {}
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let st = self.lock();
        let open_remaining = match st.status {
            CircuitStatus::Open => st.opened_at.map(|at| {
                self.cfg.break_duration.saturating_sub(at.elapsed())
            }),
            _ => None,
        };
        CircuitBreakerSnapshot {
            status: st.status,
            consecutive_failures: st.consecutive_failures,
            open_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn breaker(threshold: u32, break_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test-pool",
            CircuitBreakerConfig::new(threshold, Duration::from_millis(break_ms)),
        )
    }

    #[test]
    fn test_initially_closed() {
        let cb = breaker(3, 100);
        assert!(cb.try_acquire().is_ok());
        assert_eq!(cb.snapshot().status, CircuitStatus::Closed);
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = breaker(3, 10_000);
        cb.on_failure();
        cb.on_failure();
        assert!(cb.try_acquire().is_ok());
        cb.on_failure();
        assert_eq!(cb.snapshot().status, CircuitStatus::Open);
        let remaining = cb.try_acquire().unwrap_err();
        assert!(remaining > Duration::ZERO);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, 100);
        cb.on_failure();
        cb.on_failure();
        cb.on_success();
        assert_eq!(cb.snapshot().consecutive_failures, 0);
        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.snapshot().status, CircuitStatus::Closed);
    }

    #[test]
    fn test_half_open_admits_single_probe() {
        let cb = breaker(2, 20);
        cb.on_failure();
        cb.on_failure();
        assert!(cb.try_acquire().is_err());

        thread::sleep(Duration::from_millis(30));

        // First caller after the break becomes the trial call.
        assert!(cb.try_acquire().is_ok());
        assert_eq!(cb.snapshot().status, CircuitStatus::HalfOpen);
        // Concurrent callers are rejected while the trial is in flight.
        assert!(cb.try_acquire().is_err());

        cb.on_success();
        assert_eq!(cb.snapshot().status, CircuitStatus::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_failed_probe_reopens_with_fresh_timer() {
        let cb = breaker(2, 20);
        cb.on_failure();
        cb.on_failure();
        thread::sleep(Duration::from_millis(30));

        assert!(cb.try_acquire().is_ok());
        cb.on_failure();
        assert_eq!(cb.snapshot().status, CircuitStatus::Open);
        assert!(cb.try_acquire().is_err());

        thread::sleep(Duration::from_millis(30));
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_concurrent_failures_are_linearizable() {
        let cb = Arc::new(breaker(1_000, 10_000));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let cb = Arc::clone(&cb);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    cb.on_failure();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cb.snapshot().consecutive_failures, 500);
        assert_eq!(cb.snapshot().status, CircuitStatus::Closed);
    }
}
