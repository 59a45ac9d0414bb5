//! Fixed-window admission counter.
//!
//! Unlike a sliding window, the counter resets at discrete boundaries: the
//! window advances lazily to the current instant once a full interval has
//! elapsed since it started.

use std::time::{Duration, Instant};

/// Counts admissions within the current fixed window.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    limit: f64,
    length: Duration,
    start: Instant,
    consumed: f64,
}

impl FixedWindow {
    /// Create a window admitting up to `limit` tokens per `length`.
    pub fn new(limit: f64, length: Duration, now: Instant) -> Self {
        Self {
            limit,
            length,
            start: now,
            consumed: 0.0,
        }
    }

    /// Start a new window if the current one has run its course.
    pub fn advance(&mut self, now: Instant) {
        if now.saturating_duration_since(self.start) >= self.length {
            self.start = now;
            self.consumed = 0.0;
        }
    }

    /// Check if `count` more tokens fit in the current window.
    pub fn fits(&self, count: f64) -> bool {
        count <= self.limit - self.consumed
    }

    /// Record `count` tokens against the current window.
    pub fn consume(&mut self, count: f64) {
        self.consumed += count;
    }

    /// Return tokens consumed in the window that started at `start`.
    ///
    /// Does nothing if the window has advanced since.
    pub fn refund(&mut self, count: f64, start: Instant) {
        if self.start == start {
            self.consumed = (self.consumed - count).max(0.0);
        }
    }

    /// Instant the current window started.
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Tokens consumed in the current window.
    pub fn consumed(&self) -> f64 {
        self.consumed
    }

    /// Time left until the window boundary.
    pub fn time_until_next(&self, now: Instant) -> Duration {
        (self.start + self.length).saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_within_window() {
        let now = Instant::now();
        let mut window = FixedWindow::new(2.0, Duration::from_secs(1), now);

        assert!(window.fits(1.0));
        window.consume(1.0);
        assert!(window.fits(1.0));
        window.consume(1.0);
        assert!(!window.fits(1.0));
        assert_eq!(window.consumed(), 2.0);
    }

    #[test]
    fn test_advances_only_after_full_interval() {
        let now = Instant::now();
        let mut window = FixedWindow::new(1.0, Duration::from_secs(1), now);
        window.consume(1.0);

        window.advance(now + Duration::from_millis(999));
        assert!(!window.fits(1.0));
        assert_eq!(
            window.time_until_next(now + Duration::from_millis(999)),
            Duration::from_millis(1)
        );

        let later = now + Duration::from_secs(1);
        window.advance(later);
        assert!(window.fits(1.0));
        assert_eq!(window.start(), later);
    }

    #[test]
    fn test_refund_is_scoped_to_window() {
        let now = Instant::now();
        let mut window = FixedWindow::new(3.0, Duration::from_secs(1), now);
        window.consume(2.0);
        window.refund(1.0, now);
        assert_eq!(window.consumed(), 1.0);

        let stale = window.start();
        window.advance(now + Duration::from_secs(2));
        window.consume(1.0);
        window.refund(1.0, stale);
        assert_eq!(window.consumed(), 1.0);
    }

    #[test]
    fn test_time_until_next_saturates() {
        let now = Instant::now();
        let window = FixedWindow::new(1.0, Duration::from_millis(100), now);
        assert_eq!(
            window.time_until_next(now + Duration::from_secs(5)),
            Duration::ZERO
        );
    }
}
