//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Clock that only moves when a test moves it.
///
/// Drives bucket refill and window arithmetic deterministically from
/// synchronous code, where tokio's paused clock is not available.
///
/// Clones share the same underlying time, so advancing one advances all.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<Instant>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant.
    pub fn new(start: Instant) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *time += duration;
    }

    /// Advance the clock by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: Instant) {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
