//! A single clock abstraction so the circuit breaker and ledger cutoffs
//! are testable without wall-clock sleeps (Design Notes, "Time handling").

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Anything that can report the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock, used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock whose value is set explicitly, for deterministic tests of
/// time-dependent logic (circuit breaker reset timeouts, ledger month
/// boundaries).
#[derive(Debug)]
pub struct FixedClock {
    micros_since_epoch: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            micros_since_epoch: AtomicI64::new(at.timestamp_micros()),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        self.micros_since_epoch
            .fetch_add(duration.num_microseconds().unwrap_or(0), Ordering::SeqCst);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.micros_since_epoch
            .store(at.timestamp_micros(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros_since_epoch.load(Ordering::SeqCst);
        DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        clock.advance(chrono::Duration::seconds(60));
        assert!(clock.now() >= start + chrono::Duration::seconds(59));
    }
}
