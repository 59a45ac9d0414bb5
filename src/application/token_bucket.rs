//! Token bucket with optional hierarchical parent.
//!
//! A child bucket only hands out tokens its parent (and every ancestor) also
//! hands out. Tokens drip in continuously at `tokens_per_interval` per
//! `interval`; a bucket with a zero rate only gains tokens through
//! [`TokenBucket::fill`].

use crate::application::ports::Clock;
use crate::domain::bucket::{BucketState, Withdrawal};
use crate::domain::error::ThrottleError;
use crate::domain::interval::parse_interval;
use crate::infrastructure::clock::RuntimeClock;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Token bucket shared between concurrent callers.
///
/// # Example
/// ```
/// use task_throttle::TokenBucket;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let account = Arc::new(TokenBucket::new(100.0, 0.0, Duration::ZERO).unwrap());
/// account.fill(100.0);
///
/// let user = TokenBucket::new(10.0, 0.0, Duration::ZERO)
///     .unwrap()
///     .with_parent(Arc::clone(&account));
/// user.fill(10.0);
///
/// assert!(user.try_withdraw(4.0).unwrap());
/// assert_eq!(user.tokens(), 6.0);
/// assert_eq!(account.tokens(), 96.0);
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    parent: Option<Arc<TokenBucket>>,
    clock: Arc<dyn Clock>,
    refilled: Notify,
}

impl TokenBucket {
    /// Create an empty bucket driven by the runtime clock.
    ///
    /// A `capacity` of zero makes the bucket unbounded.
    ///
    /// # Errors
    /// `InvalidArgument` for negative or non-finite numbers, or a refilling
    /// bucket with a zero interval.
    pub fn new(
        capacity: f64,
        tokens_per_interval: f64,
        interval: Duration,
    ) -> Result<Self, ThrottleError> {
        Self::with_clock(capacity, tokens_per_interval, interval, Arc::new(RuntimeClock))
    }

    /// Create an empty bucket whose interval is a named unit or a millisecond
    /// count (see [`parse_interval`]).
    pub fn per_unit(
        capacity: f64,
        tokens_per_interval: f64,
        unit: &str,
    ) -> Result<Self, ThrottleError> {
        Self::new(capacity, tokens_per_interval, parse_interval(unit)?)
    }

    /// Create an empty bucket reading time from `clock`.
    pub fn with_clock(
        capacity: f64,
        tokens_per_interval: f64,
        interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ThrottleError> {
        let state = BucketState::new(capacity, tokens_per_interval, interval, clock.now())?;
        Ok(Self {
            state: Mutex::new(state),
            parent: None,
            clock,
            refilled: Notify::new(),
        })
    }

    /// Draw every withdrawal from `parent` as well.
    #[must_use]
    pub fn with_parent(mut self, parent: Arc<TokenBucket>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// The parent bucket, if any.
    pub fn parent(&self) -> Option<&Arc<TokenBucket>> {
        self.parent.as_ref()
    }

    /// Maximum tokens, zero when unbounded.
    pub fn capacity(&self) -> f64 {
        self.lock().capacity()
    }

    /// Tokens added per interval.
    pub fn tokens_per_interval(&self) -> f64 {
        self.lock().tokens_per_interval()
    }

    /// Length of the refill interval.
    pub fn interval(&self) -> Duration {
        self.lock().interval()
    }

    /// Drip and return the tokens currently held.
    pub fn tokens(&self) -> f64 {
        let mut state = self.lock();
        state.drip(self.clock.now());
        state.tokens()
    }

    /// Add tokens, up to capacity, and wake callers waiting on this bucket.
    pub fn fill(&self, count: f64) {
        {
            let mut state = self.lock();
            state.drip(self.clock.now());
            state.fill(count);
        }
        self.refilled.notify_waiters();
    }

    pub(crate) fn check_request(&self, count: f64) -> Result<(), ThrottleError> {
        self.lock().check_request(count)
    }

    /// Withdraw `count` tokens if this bucket and every ancestor have them.
    ///
    /// Nothing is deducted anywhere when the withdrawal fails.
    ///
    /// # Errors
    /// `CapacityExceeded` if `count` exceeds the capacity of this bucket or
    /// an ancestor; `InvalidArgument` for a negative count.
    pub fn try_withdraw(&self, count: f64) -> Result<bool, ThrottleError> {
        let mut state = self.lock();
        state.check_request(count)?;
        if state.is_unbounded() {
            return Ok(true);
        }
        state.drip(self.clock.now());
        if !state.has(count) {
            return Ok(false);
        }
        if let Some(parent) = &self.parent {
            if !parent.try_withdraw(count)? {
                return Ok(false);
            }
        }
        Ok(state.take(count))
    }

    /// Withdraw `count` tokens, waiting for them to drip in.
    ///
    /// Returns the smallest number of tokens left in this bucket or any
    /// ancestor, or `count` itself when this bucket is unbounded. If the
    /// future is dropped before completing, tokens already taken from buckets
    /// in the chain are put back.
    ///
    /// # Errors
    /// `CapacityExceeded` if `count` exceeds the capacity of this bucket or
    /// an ancestor; `InvalidArgument` for a negative count.
    pub async fn withdraw(&self, count: f64) -> Result<f64, ThrottleError> {
        let (chain, capped) = self.bounded_chain(count)?;

        let mut reservation = Reservation {
            count,
            held: Vec::with_capacity(chain.len()),
        };
        // An unbounded bucket in the chain reports the request itself.
        let mut remaining = if capped { f64::INFINITY } else { count };
        for bucket in chain {
            remaining = remaining.min(bucket.reserve(count).await);
            reservation.held.push(bucket);
        }
        reservation.commit();

        Ok(remaining)
    }

    /// Buckets that must supply `count`, from this one up to the first
    /// unbounded ancestor, and whether the chain ends without reaching one.
    fn bounded_chain(&self, count: f64) -> Result<(Vec<&TokenBucket>, bool), ThrottleError> {
        let mut chain = Vec::new();
        let mut next = Some(self);
        while let Some(bucket) = next {
            let state = bucket.lock();
            state.check_request(count)?;
            if state.is_unbounded() {
                return Ok((chain, false));
            }
            drop(state);
            chain.push(bucket);
            next = bucket.parent.as_deref();
        }
        Ok((chain, true))
    }

    /// Take `count` tokens from this bucket alone, waiting as long as needed.
    async fn reserve(&self, count: f64) -> f64 {
        loop {
            let mut notified = pin!(self.refilled.notified());
            notified.as_mut().enable();

            let step = {
                let mut state = self.lock();
                match state.withdraw(count, self.clock.now()) {
                    Withdrawal::Granted => return state.tokens(),
                    other => other,
                }
            };

            match step {
                Withdrawal::RetryAfter(wait) => {
                    tracing::trace!(count, wait_ms = wait.as_millis() as u64, "waiting for tokens");
                    tokio::time::sleep(wait).await;
                }
                _ => {
                    tracing::trace!(count, "waiting for explicit fill");
                    notified.await;
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tokens taken from a prefix of the chain, returned on drop unless committed.
struct Reservation<'a> {
    count: f64,
    held: Vec<&'a TokenBucket>,
}

impl Reservation<'_> {
    fn commit(mut self) {
        self.held.clear();
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        for bucket in self.held.drain(..) {
            bucket.fill(self.count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;
    use futures::poll;
    use std::time::Instant;

    fn mock_bucket(capacity: f64, rate: f64, interval_ms: u64, clock: &MockClock) -> TokenBucket {
        TokenBucket::with_clock(
            capacity,
            rate,
            Duration::from_millis(interval_ms),
            Arc::new(clock.clone()),
        )
        .unwrap()
    }

    #[test]
    fn test_try_withdraw_after_drip() {
        let clock = MockClock::new(Instant::now());
        let bucket = mock_bucket(10.0, 1.0, 100, &clock);

        assert!(!bucket.try_withdraw(1.0).unwrap());
        clock.advance_millis(300);
        assert!(bucket.try_withdraw(3.0).unwrap());
        assert!(!bucket.try_withdraw(1.0).unwrap());
    }

    #[test]
    fn test_parent_denial_leaves_child_untouched() {
        let clock = MockClock::new(Instant::now());
        let parent = Arc::new(mock_bucket(10.0, 0.0, 0, &clock));
        let child = mock_bucket(10.0, 0.0, 0, &clock).with_parent(Arc::clone(&parent));
        child.fill(5.0);
        parent.fill(1.0);

        assert!(!child.try_withdraw(2.0).unwrap());
        assert_eq!(child.tokens(), 5.0);
        assert_eq!(parent.tokens(), 1.0);

        assert!(child.try_withdraw(1.0).unwrap());
        assert_eq!(child.tokens(), 4.0);
        assert_eq!(parent.tokens(), 0.0);
    }

    #[test]
    fn test_child_shortage_leaves_parent_untouched() {
        let clock = MockClock::new(Instant::now());
        let parent = Arc::new(mock_bucket(10.0, 0.0, 0, &clock));
        let child = mock_bucket(10.0, 0.0, 0, &clock).with_parent(Arc::clone(&parent));
        parent.fill(10.0);

        assert!(!child.try_withdraw(1.0).unwrap());
        assert_eq!(parent.tokens(), 10.0);
    }

    #[test]
    fn test_capacity_exceeded() {
        let clock = MockClock::new(Instant::now());
        let bucket = mock_bucket(10.0, 1.0, 100, &clock);
        assert_eq!(
            bucket.try_withdraw(11.0),
            Err(ThrottleError::CapacityExceeded {
                requested: 11.0,
                capacity: 10.0
            })
        );
    }

    #[test]
    fn test_per_unit() {
        let bucket = TokenBucket::per_unit(60.0, 60.0, "minute").unwrap();
        assert_eq!(bucket.interval(), Duration::from_secs(60));
        assert!(TokenBucket::per_unit(1.0, 1.0, "fortnight").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_withdraw_waits_for_drip() {
        let bucket = TokenBucket::new(10.0, 1.0, Duration::from_millis(100)).unwrap();
        let start = tokio::time::Instant::now();

        let remaining = bucket.withdraw(10.0).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1100));
        assert_eq!(remaining, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_withdraw_returns_count() {
        let bucket = TokenBucket::new(0.0, 1.0, Duration::from_secs(1)).unwrap();
        let start = tokio::time::Instant::now();
        assert_eq!(bucket.withdraw(1_000.0).await.unwrap(), 1_000.0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_withdraw_rejects_oversized_request() {
        let bucket = TokenBucket::new(5.0, 1.0, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            bucket.withdraw(6.0).await,
            Err(ThrottleError::CapacityExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_rate_waits_for_fill() {
        let bucket = TokenBucket::new(5.0, 0.0, Duration::ZERO).unwrap();
        let mut pending = pin!(bucket.withdraw(1.0));
        assert!(poll!(pending.as_mut()).is_pending());

        bucket.fill(2.0);
        assert_eq!(pending.await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_withdraw_reports_smallest_remaining() {
        let parent = Arc::new(TokenBucket::new(10.0, 0.0, Duration::ZERO).unwrap());
        parent.fill(10.0);
        let child = TokenBucket::new(5.0, 0.0, Duration::ZERO)
            .unwrap()
            .with_parent(Arc::clone(&parent));
        child.fill(5.0);

        assert_eq!(child.withdraw(2.0).await.unwrap(), 3.0);
        assert_eq!(parent.tokens(), 8.0);
    }

    #[tokio::test]
    async fn test_dropped_withdraw_refunds_child() {
        let clock = MockClock::new(Instant::now());
        let parent = Arc::new(mock_bucket(10.0, 0.0, 0, &clock));
        let child = mock_bucket(10.0, 0.0, 0, &clock).with_parent(Arc::clone(&parent));
        child.fill(5.0);

        {
            let mut pending = pin!(child.withdraw(1.0));
            assert!(poll!(pending.as_mut()).is_pending());
            assert_eq!(child.tokens(), 4.0);
        }

        assert_eq!(child.tokens(), 5.0);
        assert_eq!(parent.tokens(), 0.0);
    }
}
