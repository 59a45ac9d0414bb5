//! Fixed-window rate limiter layered over a token bucket.
//!
//! The window caps admissions at `tokens_per_interval` per calendar window;
//! the bucket underneath spreads those admissions out at its drip rate
//! instead of letting them burst at the window edge.

use crate::application::ports::Clock;
use crate::application::token_bucket::TokenBucket;
use crate::domain::error::ThrottleError;
use crate::domain::interval::parse_interval;
use crate::domain::window::FixedWindow;
use crate::infrastructure::clock::RuntimeClock;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Result of [`RateLimiter::remove`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoveOutcome {
    /// Tokens were removed
    Granted {
        /// Tokens left in the bucket afterwards
        remaining: f64,
    },
    /// The window was exhausted and the limiter is set to fire immediately
    Rejected,
}

impl RemoveOutcome {
    /// Check if tokens were removed.
    pub fn is_granted(&self) -> bool {
        matches!(self, RemoveOutcome::Granted { .. })
    }
}

/// Limits removals to `tokens_per_interval` per fixed window.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: TokenBucket,
    window: Mutex<FixedWindow>,
    clock: Arc<dyn Clock>,
    fire_immediately: bool,
}

impl RateLimiter {
    /// Create a limiter on the runtime clock. The bucket starts full.
    ///
    /// # Errors
    /// `InvalidArgument` unless `tokens_per_interval` is positive and finite
    /// and `interval` is non-zero.
    pub fn new(tokens_per_interval: f64, interval: Duration) -> Result<Self, ThrottleError> {
        Self::with_clock(tokens_per_interval, interval, Arc::new(RuntimeClock))
    }

    /// Create a limiter whose interval is a named unit or a millisecond count.
    pub fn per_unit(tokens_per_interval: f64, unit: &str) -> Result<Self, ThrottleError> {
        Self::new(tokens_per_interval, parse_interval(unit)?)
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(
        tokens_per_interval: f64,
        interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ThrottleError> {
        if !tokens_per_interval.is_finite() || tokens_per_interval <= 0.0 {
            return Err(ThrottleError::invalid(format!(
                "tokens per interval must be a positive number, got {}",
                tokens_per_interval
            )));
        }
        if interval.is_zero() {
            return Err(ThrottleError::invalid("rate limit interval must be greater than 0"));
        }

        let bucket = TokenBucket::with_clock(
            tokens_per_interval,
            tokens_per_interval,
            interval,
            Arc::clone(&clock),
        )?;
        bucket.fill(tokens_per_interval);
        let window = FixedWindow::new(tokens_per_interval, interval, clock.now());

        Ok(Self {
            bucket,
            window: Mutex::new(window),
            clock,
            fire_immediately: false,
        })
    }

    /// Reject instead of waiting when the current window is exhausted.
    #[must_use]
    pub fn fire_immediately(mut self, enabled: bool) -> Self {
        self.fire_immediately = enabled;
        self
    }

    /// Tokens left in the bucket right now.
    pub fn tokens_remaining(&self) -> f64 {
        self.bucket.tokens()
    }

    /// Length of the window.
    pub fn interval(&self) -> Duration {
        self.bucket.interval()
    }

    /// Remove `count` tokens if both the window and the bucket allow it.
    ///
    /// # Errors
    /// `CapacityExceeded` if `count` exceeds the per-interval limit.
    pub fn try_remove(&self, count: f64) -> Result<bool, ThrottleError> {
        self.bucket.check_request(count)?;

        let mut window = self.lock_window();
        window.advance(self.clock.now());
        if !window.fits(count) {
            return Ok(false);
        }
        let removed = self.bucket.try_withdraw(count)?;
        if removed {
            window.consume(count);
        }
        Ok(removed)
    }

    /// Remove `count` tokens, waiting for the next window and for the bucket
    /// to refill as needed.
    ///
    /// Dropping the future before it completes gives back anything it had
    /// already claimed.
    ///
    /// # Errors
    /// `CapacityExceeded` if `count` exceeds the per-interval limit.
    pub async fn remove(&self, count: f64) -> Result<RemoveOutcome, ThrottleError> {
        self.bucket.check_request(count)?;

        let start = loop {
            let wait = {
                let mut window = self.lock_window();
                let now = self.clock.now();
                window.advance(now);
                if window.fits(count) {
                    window.consume(count);
                    break window.start();
                }
                window.time_until_next(now)
            };
            if self.fire_immediately {
                return Ok(RemoveOutcome::Rejected);
            }
            tracing::trace!(count, wait_ms = wait.as_millis() as u64, "window exhausted");
            tokio::time::sleep(wait).await;
        };

        let mut claim = WindowClaim {
            limiter: self,
            count,
            start: Some(start),
        };
        let remaining = self.bucket.withdraw(count).await?;
        claim.start = None;

        Ok(RemoveOutcome::Granted { remaining })
    }

    fn lock_window(&self) -> MutexGuard<'_, FixedWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Window consumption that is refunded unless the bucket withdrawal finishes.
struct WindowClaim<'a> {
    limiter: &'a RateLimiter,
    count: f64,
    start: Option<Instant>,
}

impl Drop for WindowClaim<'_> {
    fn drop(&mut self) {
        if let Some(start) = self.start.take() {
            self.limiter.lock_window().refund(self.count, start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;

    #[test]
    fn test_starts_full() {
        let limiter = RateLimiter::new(5.0, Duration::from_secs(1)).unwrap();
        assert_eq!(limiter.tokens_remaining(), 5.0);
    }

    #[test]
    fn test_invalid_rates() {
        assert!(RateLimiter::new(0.0, Duration::from_secs(1)).is_err());
        assert!(RateLimiter::new(f64::INFINITY, Duration::from_secs(1)).is_err());
        assert!(RateLimiter::new(1.0, Duration::ZERO).is_err());
        assert!(RateLimiter::per_unit(1.0, "century").is_err());
        assert_eq!(
            RateLimiter::per_unit(1.0, "hour").unwrap().interval(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_try_remove_respects_window() {
        let clock = MockClock::new(Instant::now());
        let limiter =
            RateLimiter::with_clock(2.0, Duration::from_secs(1), Arc::new(clock.clone())).unwrap();

        assert!(limiter.try_remove(1.0).unwrap());
        assert!(limiter.try_remove(1.0).unwrap());
        assert!(!limiter.try_remove(1.0).unwrap());

        clock.advance_millis(999);
        assert!(!limiter.try_remove(1.0).unwrap());

        clock.advance_millis(1);
        assert!(limiter.try_remove(1.0).unwrap());
    }

    #[test]
    fn test_try_remove_oversized() {
        let limiter = RateLimiter::new(2.0, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            limiter.try_remove(3.0),
            Err(ThrottleError::CapacityExceeded { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_spaces_out_grants() {
        let limiter = RateLimiter::new(1.0, Duration::from_millis(1000)).unwrap();

        let first = limiter.remove(1.0).await.unwrap();
        let granted_at = tokio::time::Instant::now();
        let second = limiter.remove(1.0).await.unwrap();

        assert_eq!(first, RemoveOutcome::Granted { remaining: 0.0 });
        assert!(second.is_granted());
        assert!(granted_at.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_immediately_rejects() {
        let limiter = RateLimiter::new(1.0, Duration::from_secs(1))
            .unwrap()
            .fire_immediately(true);

        assert!(limiter.remove(1.0).await.unwrap().is_granted());
        assert_eq!(limiter.remove(1.0).await.unwrap(), RemoveOutcome::Rejected);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.remove(1.0).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn test_remove_oversized() {
        let limiter = RateLimiter::new(1.0, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            limiter.remove(2.0).await,
            Err(ThrottleError::CapacityExceeded { .. })
        ));
    }
}
