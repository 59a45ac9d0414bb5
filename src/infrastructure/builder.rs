//! Builder for [`Throttle`].
//!
//! All validation happens in [`ThrottleBuilder::build`]; nothing is checked
//! lazily on the first call.

use crate::application::gate::{ConcurrencyGate, DoneHook, ErrorHandler, GateConfig};
use crate::application::metrics::Metrics;
use crate::application::ports::Clock;
use crate::application::rate_limiter::RateLimiter;
use crate::application::throttle::{RateGate, Throttle};
use crate::domain::error::ThrottleError;
use crate::domain::interval::parse_interval;
use crate::domain::policy::{DropPolicy, QueueOrder};
use crate::infrastructure::clock::RuntimeClock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing a [`Throttle`].
///
/// # Example
/// ```
/// use task_throttle::Throttle;
/// use std::time::Duration;
///
/// let throttle = Throttle::builder()
///     .with_concurrency(4)
///     .with_interval(Duration::from_secs(1))
///     .with_drop(true)
///     .with_drop_last(false)
///     .build()
///     .unwrap();
/// assert_eq!(throttle.gate().limit(), 4);
/// ```
pub struct ThrottleBuilder {
    concurrency: usize,
    interval: Duration,
    interval_unit: Option<String>,
    ordered: bool,
    wait_for_return: bool,
    drop: bool,
    drop_last: bool,
    queue_capacity: Option<usize>,
    on_done: Option<DoneHook>,
    error_handler: Option<ErrorHandler>,
    clock: Option<Arc<dyn Clock>>,
}

impl ThrottleBuilder {
    /// Create a builder with the defaults: one slot, no rate limit, ordered,
    /// waiting for each job to settle, queueing rather than dropping.
    pub fn new() -> Self {
        Self {
            concurrency: 1,
            interval: Duration::ZERO,
            interval_unit: None,
            ordered: true,
            wait_for_return: true,
            drop: false,
            drop_last: true,
            queue_capacity: None,
            on_done: None,
            error_handler: None,
            clock: None,
        }
    }

    /// Set the number of jobs allowed to run at once.
    ///
    /// With an interval set, this is also the number of starts per interval.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enable rate limiting with this interval. Zero disables it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self.interval_unit = None;
        self
    }

    /// Enable rate limiting with a named interval (`"sec"`, `"minute"`,
    /// `"hour"`, `"day"`, ...) or a millisecond count.
    ///
    /// The unit is parsed when `build()` is called.
    pub fn with_interval_unit(mut self, unit: impl Into<String>) -> Self {
        self.interval_unit = Some(unit.into());
        self
    }

    /// Start rate-limited jobs in call order.
    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Hold the slot until the job settles, rather than only until it starts.
    pub fn with_wait_for_return(mut self, wait: bool) -> Self {
        self.wait_for_return = wait;
        self
    }

    /// Shed callers instead of queueing them when the throttle is saturated.
    pub fn with_drop(mut self, drop: bool) -> Self {
        self.drop = drop;
        self
    }

    /// When dropping, shed the incoming caller (`true`) or the one already
    /// waiting (`false`).
    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Bound the wait queue. A full queue fails calls with `QueueFull`.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Call `hook` each time the throttle becomes idle: every call made has
    /// either finished with its slot or been shed, and at least one ran.
    pub fn with_on_done<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_done = Some(Arc::new(hook));
        self
    }

    /// Report errors returned to callers, and hook panics, to `handler`.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ThrottleError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Set a custom clock for the rate limiter (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the throttle.
    ///
    /// # Errors
    /// `InvalidArgument` for zero or unbounded (`usize::MAX`) concurrency,
    /// a zero queue capacity, or an unknown interval unit.
    pub fn build(self) -> Result<Throttle, ThrottleError> {
        if self.concurrency == 0 {
            return Err(ThrottleError::invalid("concurrency must be at least 1"));
        }
        if self.concurrency == usize::MAX {
            return Err(ThrottleError::invalid("infinite concurrency is not allowed"));
        }
        let interval = match &self.interval_unit {
            Some(unit) => parse_interval(unit)?,
            None => self.interval,
        };

        let policy = DropPolicy::from_flags(self.drop, self.drop_last);
        let metrics = Metrics::new();
        let gate = ConcurrencyGate::with_metrics(
            GateConfig {
                limit: self.concurrency,
                policy,
                order: QueueOrder::Fifo,
                queue_capacity: self.queue_capacity,
                on_done: None,
                error_handler: self.error_handler.clone(),
            },
            metrics.clone(),
        )?;

        let rate = if interval.is_zero() {
            None
        } else {
            let clock = self.clock.unwrap_or_else(|| Arc::new(RuntimeClock));
            let limiter = RateLimiter::with_clock(self.concurrency as f64, interval, clock)?;
            let funnel_policy = match policy {
                DropPolicy::DropOldest => DropPolicy::DropOldest,
                _ => DropPolicy::Queue,
            };
            let funnel = if self.ordered || funnel_policy.sheds() {
                Some(ConcurrencyGate::with_config(GateConfig {
                    limit: 1,
                    policy: funnel_policy,
                    ..GateConfig::default()
                })?)
            } else {
                None
            };
            Some(RateGate {
                limiter,
                funnel,
                policy,
                metrics,
            })
        };

        tracing::debug!(
            concurrency = self.concurrency,
            interval_ms = interval.as_millis() as u64,
            ordered = self.ordered,
            wait_for_return = self.wait_for_return,
            ?policy,
            "throttle built"
        );

        Ok(Throttle::from_parts(
            gate,
            rate,
            self.wait_for_return,
            self.on_done,
            self.error_handler,
        ))
    }
}

impl Default for ThrottleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThrottleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleBuilder")
            .field("concurrency", &self.concurrency)
            .field("interval", &self.interval)
            .field("interval_unit", &self.interval_unit)
            .field("ordered", &self.ordered)
            .field("wait_for_return", &self.wait_for_return)
            .field("drop", &self.drop)
            .field("drop_last", &self.drop_last)
            .field("queue_capacity", &self.queue_capacity)
            .field("on_done", &self.on_done.as_ref().map(|_| "<fn>"))
            .field("error_handler", &self.error_handler.as_ref().map(|_| "<fn>"))
            .field("clock", &self.clock)
            .finish()
    }
}
