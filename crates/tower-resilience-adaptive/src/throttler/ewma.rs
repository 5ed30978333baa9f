//! Continuously-decaying request/accept counters driving the throttler's
//! rejection probability.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A leaky counter: each recorded event adds `1.0`, and the stored value
/// decays exponentially towards zero with the given half-life. Reading the
/// value applies the decay owed since the last write without requiring a
/// background task.
pub(crate) struct EwmaCounter {
    half_life: Duration,
    state: Mutex<(f64, Instant)>,
}

impl EwmaCounter {
    pub(crate) fn new(half_life: Duration) -> Self {
        Self {
            half_life,
            state: Mutex::new((0.0, Instant::now())),
        }
    }

    fn decayed_locked(&self, value: f64, elapsed: Duration) -> f64 {
        if self.half_life.is_zero() {
            return value;
        }
        let exponent = -elapsed.as_secs_f64() * std::f64::consts::LN_2 / self.half_life.as_secs_f64();
        value * exponent.exp()
    }

    /// Records one occurrence, decaying the prior value first.
    pub(crate) fn record(&self) -> f64 {
        let mut guard = self.state.lock().expect("ewma counter poisoned");
        let (value, last) = *guard;
        let now = Instant::now();
        let decayed = self.decayed_locked(value, now.duration_since(last));
        let updated = decayed + 1.0;
        *guard = (updated, now);
        updated
    }

    /// Current value with decay applied, without recording a new occurrence.
    pub(crate) fn value(&self) -> f64 {
        let guard = self.state.lock().expect("ewma counter poisoned");
        let (value, last) = *guard;
        self.decayed_locked(value, Instant::now().duration_since(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_increments_the_value() {
        let counter = EwmaCounter::new(Duration::from_secs(60));
        assert_eq!(counter.record(), 1.0);
        assert_eq!(counter.record(), 2.0);
    }

    #[test]
    fn value_decays_towards_zero_over_time() {
        let counter = EwmaCounter::new(Duration::from_millis(10));
        counter.record();
        std::thread::sleep(Duration::from_millis(50));
        assert!(counter.value() < 0.5);
    }

    #[test]
    fn zero_half_life_disables_decay() {
        let counter = EwmaCounter::new(Duration::ZERO);
        counter.record();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.value(), 1.0);
    }
}
