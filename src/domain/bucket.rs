//! Token bucket arithmetic.
//!
//! `BucketState` holds the numbers and nothing else: callers supply the
//! current instant, so every decision here is deterministic and testable
//! without a runtime.

use crate::domain::error::ThrottleError;
use std::time::{Duration, Instant};

/// Result of asking a bucket for tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withdrawal {
    /// The tokens were deducted
    Granted,
    /// Not enough tokens yet; enough will have dripped in after this long
    RetryAfter(Duration),
    /// Not enough tokens and the bucket never refills on its own
    Starved,
}

/// Token count, refill rate and capacity of a single bucket.
#[derive(Debug, Clone)]
pub struct BucketState {
    /// Maximum tokens; zero means unbounded
    capacity: f64,
    tokens_per_interval: f64,
    interval: Duration,
    tokens: f64,
    last_drip: Instant,
}

impl BucketState {
    /// Create an empty bucket.
    ///
    /// # Errors
    /// Returns `ThrottleError::InvalidArgument` for negative or non-finite
    /// numbers, or a refilling bucket with a zero interval.
    pub fn new(
        capacity: f64,
        tokens_per_interval: f64,
        interval: Duration,
        now: Instant,
    ) -> Result<Self, ThrottleError> {
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(ThrottleError::invalid(format!(
                "bucket capacity must be a finite non-negative number, got {}",
                capacity
            )));
        }
        if !tokens_per_interval.is_finite() || tokens_per_interval < 0.0 {
            return Err(ThrottleError::invalid(format!(
                "refill rate must be a finite non-negative number, got {}",
                tokens_per_interval
            )));
        }
        if tokens_per_interval > 0.0 && interval.is_zero() {
            return Err(ThrottleError::invalid("refill interval must be greater than 0"));
        }
        Ok(Self {
            capacity,
            tokens_per_interval,
            interval,
            tokens: 0.0,
            last_drip: now,
        })
    }

    /// Maximum number of tokens, zero when unbounded.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens added per interval.
    pub fn tokens_per_interval(&self) -> f64 {
        self.tokens_per_interval
    }

    /// Length of the refill interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tokens currently held, as of the last drip.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Check if the bucket has no capacity limit.
    pub fn is_unbounded(&self) -> bool {
        self.capacity == 0.0
    }

    /// Reject requests that can never be satisfied.
    ///
    /// # Errors
    /// `CapacityExceeded` if `count` is above a bounded capacity,
    /// `InvalidArgument` if `count` is negative or not a number.
    pub fn check_request(&self, count: f64) -> Result<(), ThrottleError> {
        if count.is_nan() || count < 0.0 {
            return Err(ThrottleError::invalid(format!(
                "token count must be non-negative, got {}",
                count
            )));
        }
        if !self.is_unbounded() && count > self.capacity {
            return Err(ThrottleError::CapacityExceeded {
                requested: count,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Add the tokens that accrued since the last drip.
    pub fn drip(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_drip);
        if now > self.last_drip {
            self.last_drip = now;
        }
        if self.tokens_per_interval == 0.0 || self.is_unbounded() {
            return;
        }
        let amount = millis(elapsed) * self.tokens_per_interval / millis(self.interval);
        self.tokens = (self.tokens + amount).min(self.capacity);
    }

    /// Check if `count` tokens are available right now.
    pub fn has(&self, count: f64) -> bool {
        self.is_unbounded() || count <= self.tokens
    }

    /// Deduct `count` tokens if available.
    pub fn take(&mut self, count: f64) -> bool {
        if self.is_unbounded() {
            return true;
        }
        if count > self.tokens {
            return false;
        }
        self.tokens -= count;
        true
    }

    /// Add tokens explicitly, up to capacity.
    pub fn fill(&mut self, count: f64) {
        if self.is_unbounded() {
            return;
        }
        self.tokens = (self.tokens + count.max(0.0)).min(self.capacity);
    }

    /// How long until `count` tokens will have dripped in, or `None` if the
    /// bucket never refills by itself.
    pub fn wait_time(&self, count: f64) -> Option<Duration> {
        if self.tokens_per_interval == 0.0 {
            return None;
        }
        let missing = (count - self.tokens).max(0.0);
        let wait = (missing * millis(self.interval) / self.tokens_per_interval).ceil();
        Some(Duration::from_millis(wait as u64))
    }

    /// Drip, then deduct `count` tokens or say how long to wait.
    pub fn withdraw(&mut self, count: f64, now: Instant) -> Withdrawal {
        self.drip(now);
        if self.take(count) {
            return Withdrawal::Granted;
        }
        match self.wait_time(count) {
            // Rounding can leave a sliver missing after an exact wait.
            Some(wait) => Withdrawal::RetryAfter(wait.max(Duration::from_millis(1))),
            None => Withdrawal::Starved,
        }
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}
