use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use instant::Instant;

/// Source of wall clock time for the evaluation budget.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    auto_tick: Duration,
}

/// A clock that only moves when told to. Clones share the same time.
///
/// With an auto tick set, every read advances the clock by that amount after
/// returning, which makes "work takes time" deterministic in tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                auto_tick: Duration::ZERO,
            })),
        }
    }
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.now += by;
    }
    pub fn set_auto_tick(&self, tick: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.auto_tick = tick;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = state.now;
        let tick = state.auto_tick;
        state.now = now + tick;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_asked() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now() - start, Duration::from_millis(5));

        let shared = clock.clone();
        shared.set_auto_tick(Duration::from_millis(1));
        let a = clock.now();
        let b = shared.now();
        assert_eq!(b - a, Duration::from_millis(1));
    }
}
