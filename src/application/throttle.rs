//! Throttle composition.
//!
//! A call first passes the rate gate (when an interval is configured), then
//! takes a slot from the concurrency gate, then runs. The slot is released
//! after the job settles, or as soon as the job has been started when
//! `wait_for_return` is off.

use crate::application::gate::{run_idle_hook, ConcurrencyGate, Done, DoneHook, ErrorHandler, Slot};
use crate::application::metrics::Metrics;
use crate::application::rate_limiter::RateLimiter;
use crate::domain::error::ThrottleError;
use crate::domain::outcome::Outcome;
use crate::domain::policy::DropPolicy;
use crate::infrastructure::builder::ThrottleBuilder;
use std::fmt;
use std::future::{poll_fn, Future};
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;

/// Start-rate admission in front of the concurrency gate.
pub(crate) struct RateGate {
    pub(crate) limiter: RateLimiter,
    /// Single-slot gate callers pass through while waiting for tokens
    pub(crate) funnel: Option<ConcurrencyGate>,
    pub(crate) policy: DropPolicy,
    pub(crate) metrics: Metrics,
}

impl RateGate {
    async fn admit(&self) -> Result<Outcome<()>, ThrottleError> {
        let nobody_waiting = self.funnel.as_ref().map_or(true, ConcurrencyGate::is_idle);
        if nobody_waiting && self.limiter.try_remove(1.0)? {
            return Ok(Outcome::Completed(()));
        }

        if self.policy == DropPolicy::DropNewest {
            self.metrics.record_dropped();
            tracing::debug!("rate limit reached, call dropped");
            return Ok(Outcome::Dropped);
        }

        let _turn = match &self.funnel {
            Some(funnel) => match funnel.acquire().await? {
                Outcome::Completed(slot) => Some(slot),
                Outcome::Dropped => {
                    self.metrics.record_dropped();
                    tracing::debug!("superseded while waiting for rate tokens");
                    return Ok(Outcome::Dropped);
                }
            },
            None => None,
        };
        self.limiter.remove(1.0).await?;
        Ok(Outcome::Completed(()))
    }
}

impl fmt::Debug for RateGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateGate")
            .field("limiter", &self.limiter)
            .field("ordered", &self.funnel.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Counts calls from the moment they are made until their slot is given
/// back, so `on_done` fires once per return to idle rather than every time
/// the concurrency gate alone empties.
struct Drain {
    state: Mutex<DrainState>,
    hook: Option<DoneHook>,
    error_handler: Option<ErrorHandler>,
}

#[derive(Default)]
struct DrainState {
    /// Calls made and not yet finished with their slot
    active: usize,
    /// A call was admitted since the hook last fired
    armed: bool,
}

impl Drain {
    fn enter(self: &Arc<Self>) -> Entry {
        self.lock().active += 1;
        Entry {
            drain: Arc::clone(self),
        }
    }

    fn leave(&self) {
        let drained = {
            let mut state = self.lock();
            state.active = state.active.saturating_sub(1);
            let drained = state.active == 0 && state.armed;
            if drained {
                state.armed = false;
            }
            drained
        };
        if !drained {
            return;
        }
        if let Some(hook) = &self.hook {
            tracing::debug!("throttle drained");
            run_idle_hook(hook, self.error_handler.as_ref());
        }
    }

    fn lock(&self) -> MutexGuard<'_, DrainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One call's place in the drain count; leaves it on drop.
struct Entry {
    drain: Arc<Drain>,
}

impl Entry {
    /// Keep counting the call until `slot` is released.
    fn hold(self, slot: Slot) -> Slot {
        self.drain.lock().armed = true;
        slot.on_release(move || drop(self))
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.drain.leave();
    }
}

struct ThrottleInner {
    gate: ConcurrencyGate,
    rate: Option<RateGate>,
    wait_for_return: bool,
    drain: Arc<Drain>,
    error_handler: Option<ErrorHandler>,
}

/// Concurrency- and rate-limited job runner.
///
/// Clones share the same limits.
///
/// # Example
/// ```
/// use task_throttle::{Outcome, Throttle};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let throttle = Throttle::builder()
///     .with_concurrency(2)
///     .build()
///     .unwrap();
///
/// let answer = throttle.run(|| async { 6 * 7 }).await.unwrap();
/// assert_eq!(answer, Outcome::Completed(42));
/// # }
/// ```
#[derive(Clone)]
pub struct Throttle {
    inner: Arc<ThrottleInner>,
}

impl Throttle {
    /// Create a throttle allowing `concurrency` simultaneous jobs.
    ///
    /// # Errors
    /// `InvalidArgument` if `concurrency` is zero or `usize::MAX`.
    pub fn new(concurrency: usize) -> Result<Self, ThrottleError> {
        Self::builder().with_concurrency(concurrency).build()
    }

    /// Create a builder for a throttle.
    pub fn builder() -> ThrottleBuilder {
        ThrottleBuilder::new()
    }

    pub(crate) fn from_parts(
        gate: ConcurrencyGate,
        rate: Option<RateGate>,
        wait_for_return: bool,
        on_done: Option<DoneHook>,
        error_handler: Option<ErrorHandler>,
    ) -> Self {
        let drain = Arc::new(Drain {
            state: Mutex::new(DrainState::default()),
            hook: on_done,
            error_handler: error_handler.clone(),
        });
        Self {
            inner: Arc::new(ThrottleInner {
                gate,
                rate,
                wait_for_return,
                drain,
                error_handler,
            }),
        }
    }

    /// Run a value-returning job once admitted.
    ///
    /// Returns `Outcome::Dropped` if the call was shed. The job's output,
    /// including any error it carries, is returned unchanged.
    ///
    /// The call counts toward `on_done` as soon as this method returns, even
    /// before the future is first polled.
    ///
    /// # Cancellation
    /// Dropping the returned future before the call is admitted withdraws it
    /// from the wait queue and counts it in
    /// [`Metrics::calls_cancelled`](crate::Metrics::calls_cancelled). To cancel
    /// a waiter from another task, hold a [`Ticket`](crate::Ticket) from
    /// [`ConcurrencyGate::enqueue`] on [`Throttle::gate`] and use its
    /// [`CancelHandle`](crate::CancelHandle); that path skips the rate limit.
    ///
    /// ```
    /// use task_throttle::Throttle;
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let throttle = Throttle::new(1).unwrap();
    /// let _busy = throttle.gate().try_acquire().unwrap();
    ///
    /// let call = throttle.run(|| async { "late" });
    /// let gave_up = tokio::time::timeout(Duration::from_millis(10), call).await;
    /// assert!(gave_up.is_err());
    /// assert_eq!(throttle.metrics().calls_cancelled(), 1);
    /// # }
    /// ```
    ///
    /// # Errors
    /// `QueueFull` if the wait queue is fixed-size and full.
    pub fn run<'a, F, Fut>(
        &'a self,
        job: F,
    ) -> impl Future<Output = Result<Outcome<Fut::Output>, ThrottleError>> + 'a
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future + 'a,
    {
        let entry = self.inner.drain.enter();
        async move {
            let slot = match self.admit(entry).await? {
                Outcome::Completed(slot) => slot,
                Outcome::Dropped => return Ok(Outcome::Dropped),
            };

            if self.inner.wait_for_return {
                let output = job().await;
                slot.release();
                return Ok(Outcome::Completed(output));
            }

            let mut running = pin!(job());
            let started = poll_fn(|cx| Poll::Ready(running.as_mut().poll(cx))).await;
            slot.release();
            let output = match started {
                Poll::Ready(output) => output,
                Poll::Pending => running.await,
            };
            Ok(Outcome::Completed(output))
        }
    }

    /// Run a callback-style job once admitted.
    ///
    /// The job receives a [`Done`] handle. With `wait_for_return` the slot is
    /// held until the job calls [`Done::release`] or drops every clone of
    /// it; otherwise it is released as soon as the job returns.
    ///
    /// # Errors
    /// `QueueFull` if the wait queue is fixed-size and full.
    pub fn run_callback<'a, F, T>(
        &'a self,
        job: F,
    ) -> impl Future<Output = Result<Outcome<T>, ThrottleError>> + 'a
    where
        F: FnOnce(Done) -> T + 'a,
        T: 'a,
    {
        let entry = self.inner.drain.enter();
        async move {
            let slot = match self.admit(entry).await? {
                Outcome::Completed(slot) => slot,
                Outcome::Dropped => return Ok(Outcome::Dropped),
            };

            let done = Done::new(slot);
            let output = job(done.clone());
            if !self.inner.wait_for_return {
                done.release();
            }
            Ok(Outcome::Completed(output))
        }
    }

    /// Bind a value-returning job, producing a callable throttled function.
    pub fn bind<F>(&self, job: F) -> Throttled<F> {
        Throttled {
            throttle: self.clone(),
            job,
        }
    }

    /// Bind a callback-style job.
    pub fn bind_callback<F>(&self, job: F) -> ThrottledCallback<F> {
        ThrottledCallback {
            throttle: self.clone(),
            job,
        }
    }

    /// The concurrency gate behind this throttle.
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    /// Counters for admission decisions.
    pub fn metrics(&self) -> &Metrics {
        self.inner.gate.metrics()
    }

    async fn admit(&self, entry: Entry) -> Result<Outcome<Slot>, ThrottleError> {
        match self.pass_gates().await {
            Ok(outcome) => Ok(outcome.map(|slot| entry.hold(slot))),
            Err(err) => Err(self.report(err)),
        }
    }

    /// Rate first, then concurrency.
    async fn pass_gates(&self) -> Result<Outcome<Slot>, ThrottleError> {
        if let Some(rate) = &self.inner.rate {
            if rate.admit().await?.is_dropped() {
                return Ok(Outcome::Dropped);
            }
        }
        self.inner.gate.acquire().await
    }

    fn report(&self, err: ThrottleError) -> ThrottleError {
        if let Some(handler) = &self.inner.error_handler {
            handler(&err);
        }
        err
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("gate", &self.inner.gate)
            .field("rate", &self.inner.rate)
            .field("wait_for_return", &self.inner.wait_for_return)
            .finish()
    }
}

/// A value-returning job bound to a [`Throttle`].
#[derive(Clone)]
pub struct Throttled<F> {
    throttle: Throttle,
    job: F,
}

impl<F> Throttled<F> {
    /// Call the bound job with `args` once admitted.
    pub fn call<'a, A, Fut>(
        &'a self,
        args: A,
    ) -> impl Future<Output = Result<Outcome<Fut::Output>, ThrottleError>> + 'a
    where
        F: Fn(A) -> Fut + 'a,
        A: 'a,
        Fut: Future + 'a,
    {
        let job = &self.job;
        self.throttle.run(move || job(args))
    }

    /// The throttle this job is bound to.
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }
}

impl<F> fmt::Debug for Throttled<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttled")
            .field("throttle", &self.throttle)
            .field("job", &"<fn>")
            .finish()
    }
}

/// A callback-style job bound to a [`Throttle`].
#[derive(Clone)]
pub struct ThrottledCallback<F> {
    throttle: Throttle,
    job: F,
}

impl<F> ThrottledCallback<F> {
    /// Call the bound job with a [`Done`] handle and `args` once admitted.
    pub fn call<'a, A, T>(
        &'a self,
        args: A,
    ) -> impl Future<Output = Result<Outcome<T>, ThrottleError>> + 'a
    where
        F: Fn(Done, A) -> T + 'a,
        A: 'a,
        T: 'a,
    {
        let job = &self.job;
        self.throttle.run_callback(move |done| job(done, args))
    }

    /// The throttle this job is bound to.
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }
}

impl<F> fmt::Debug for ThrottledCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottledCallback")
            .field("throttle", &self.throttle)
            .field("job", &"<fn>")
            .finish()
    }
}
