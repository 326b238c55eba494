//! Three-state circuit breaker guarding the editor adapter (§4.K).

use crate::clock::Clock;
use crate::types::{CircuitBreakerState, CircuitState};
use std::sync::Mutex;

pub struct CircuitBreaker {
    clock: Box<dyn Clock>,
    failure_threshold: u32,
    reset_timeout: chrono::Duration,
    state: Mutex<CircuitBreakerState>,
}

impl CircuitBreaker {
    pub fn new(clock: Box<dyn Clock>, failure_threshold: u32, reset_timeout_secs: u64) -> Self {
        Self {
            clock,
            failure_threshold,
            reset_timeout: chrono::Duration::seconds(reset_timeout_secs as i64),
            state: Mutex::new(CircuitBreakerState::default()),
        }
    }

    /// Whether a new task may be dispatched right now. Transitions
    /// `Open` -> `HalfOpen` if the reset timeout has elapsed.
    pub fn allow_request(&self) -> bool {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        match state.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed_enough = state
                    .last_failure_time
                    .map(|at| self.clock.now() - at >= self.reset_timeout)
                    .unwrap_or(true);
                if elapsed_enough {
                    state.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.last_failure_time = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        state.failure_count += 1;
        state.last_failure_time = Some(self.clock.now());
        if state.state == CircuitState::HalfOpen || state.failure_count >= self.failure_threshold {
            state.state = CircuitState::Open;
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        self.state.lock().expect("circuit breaker lock poisoned").clone()
    }
}
