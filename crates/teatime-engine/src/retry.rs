//! Retry/fallback controller
//!
//! Wraps a named operation in a bounded retry policy. The budget lives in an
//! explicit [`RetryState`] rather than loop control flow, so the attempt
//! count and fallback order are testable on their own.
//!
//! Only transient failures are retried ([`TeatimeError::is_transient`]).
//! An Unknown page variant or a slot shortage is final the moment it is
//! observed; retrying would not change the outcome. Exhaustion surfaces the
//! last failure unchanged, never a downgraded success.

use crate::timing::Clock;
use std::future::Future;
use std::time::Duration;
use teatime_core::{Result, RuntimeSettings};
use tracing::{debug, warn};

/// Bounded retry policy for one class of guarded operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total invocation budget (first attempt included)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Multiplier applied per failed attempt; 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 1.0,
        }
    }

    pub fn from_runtime(runtime: &RuntimeSettings) -> Self {
        Self {
            max_attempts: runtime.max_retries.max(1),
            initial_delay: Duration::from_millis(runtime.retry_delay_ms),
            backoff_multiplier: runtime.backoff_multiplier,
        }
    }

    /// Delay after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .max(1.0)
            .powi(attempt.min(16) as i32);
        self.initial_delay.mul_f64(factor)
    }
}

/// Per-operation retry bookkeeping, discarded when the guarded operation
/// finally succeeds or exhausts its budget.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub last_failure: Option<String>,
}

impl RetryState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
            last_failure: None,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    /// Whether the guarded operation needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts_made > 1
    }
}

/// Pick the navigation route for a zero-based attempt, cycling through the
/// alternates when the primary keeps failing.
pub fn route_for_attempt(routes: &[String], attempt: u32) -> &str {
    &routes[(attempt as usize) % routes.len()]
}

/// Executes guarded operations under a retry policy.
pub struct RetryController<'a> {
    clock: &'a dyn Clock,
}

impl<'a> RetryController<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self { clock }
    }

    /// Run `op` under `policy`.
    ///
    /// The closure receives the zero-based attempt index so callers can
    /// substitute an alternate navigation path per attempt. Returns the final
    /// result together with the retry state for the caller's step trace.
    pub async fn run<T, F, Fut>(
        &self,
        name: &str,
        policy: &RetryPolicy,
        mut op: F,
    ) -> (Result<T>, RetryState)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = RetryState::new(policy.max_attempts);

        loop {
            let attempt = state.attempts_made;
            state.attempts_made += 1;
            debug!(
                "{}: attempt {}/{}",
                name, state.attempts_made, state.max_attempts
            );

            match op(attempt).await {
                Ok(value) => return (Ok(value), state),
                Err(e) if !e.is_transient() => {
                    debug!("{}: non-retryable failure: {}", name, e);
                    state.last_failure = Some(e.to_string());
                    return (Err(e), state);
                }
                Err(e) => {
                    state.last_failure = Some(e.to_string());
                    if state.exhausted() {
                        warn!(
                            "{}: failed after {} attempt(s): {}",
                            name, state.attempts_made, e
                        );
                        return (Err(e), state);
                    }
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "{}: attempt {} failed ({}), retrying in {:?}",
                        name, state.attempts_made, e, delay
                    );
                    self.clock.sleep(delay).await;
                }
            }
        }
    }
}
