//! Clock adapters for time operations.
//!
//! `SystemClock` reads the OS monotonic clock. `RuntimeClock` reads tokio's
//! clock, which follows `tokio::time::pause`/`advance`, so bucket refill and
//! timer waits stay consistent under paused test time. Gates default to
//! `RuntimeClock`.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a clock that only
//! moves when told to. Available with the `test-helpers` feature or in test
//! builds:
//!
//! ```toml
//! [dev-dependencies]
//! task-throttle = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use std::time::Instant;

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock backed by `tokio::time::Instant`.
///
/// Matches the clock `tokio::time::sleep` uses, including when the runtime's
/// time is paused.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeClock;

impl RuntimeClock {
    /// Create a new runtime clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}
