//! # task-throttle
//!
//! Concurrency and rate admission for async jobs.
//!
//! A [`Throttle`] wraps units of work ("jobs") and enforces two independent
//! limits: how many jobs run at once, and how many jobs may start per
//! interval. Callers arriving at a saturated throttle are queued in call
//! order, or shed with [`Outcome::Dropped`] when a drop policy is configured.
//!
//! ## Quick Start
//!
//! ```rust
//! use task_throttle::{Outcome, Throttle};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // At most two jobs in flight; the rest wait their turn.
//! let throttle = Throttle::new(2).unwrap();
//!
//! let fetch = throttle.bind(|id: u32| async move { format!("user {}", id) });
//! let user = fetch.call(7).await.unwrap();
//! assert_eq!(user, Outcome::Completed("user 7".to_string()));
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use task_throttle::Throttle;
//! use std::time::Duration;
//!
//! let throttle = Throttle::builder()
//!     .with_concurrency(5)                      // 5 in flight, 5 starts per interval
//!     .with_interval(Duration::from_secs(1))    // enables rate limiting
//!     .with_ordered(true)                       // starts follow call order
//!     .with_wait_for_return(true)               // hold the slot until the job settles
//!     .with_drop(true)                          // shed instead of queueing...
//!     .with_drop_last(false)                    // ...but keep the newest waiter
//!     .with_on_done(|| tracing::info!("throttle drained"))
//!     .build()
//!     .unwrap();
//! # drop(throttle);
//! ```
//!
//! Configuration errors are reported by `build()` as
//! [`ThrottleError::InvalidArgument`]; nothing is validated lazily.
//!
//! ## Jobs
//!
//! Jobs come in two explicit flavors:
//! - **Value-returning** ([`Throttle::run`], [`Throttle::bind`]): the job
//!   returns a future, and the caller receives its output.
//! - **Callback-style** ([`Throttle::run_callback`], [`Throttle::bind_callback`]):
//!   the job receives a [`Done`] handle and signals completion by releasing it.
//!
//! Failures of the job itself are carried inside `Outcome::Completed`
//! unchanged; the slot is released on every exit path, including panics and
//! cancellation.
//!
//! ## Building Blocks
//!
//! The pieces are usable on their own:
//! - [`ConcurrencyGate`]: slots plus a FIFO/LIFO wait queue with drop
//!   policies and O(1) cancellation.
//! - [`TokenBucket`]: continuous refill with optional parent buckets.
//! - [`RateLimiter`]: at most N removals per fixed window, smoothed by a
//!   bucket.
//! - [`BoundedDeque`]: the arena-backed ring the wait queue is built on.
//!
//! ## Observability
//!
//! Decisions are logged through `tracing` (`debug` for drops and
//! cancellations, `trace` for waits) and counted in [`Metrics`]:
//!
//! ```rust
//! # use task_throttle::Throttle;
//! let throttle = Throttle::new(1).unwrap();
//! let snapshot = throttle.metrics().snapshot();
//! println!("drop rate: {:.2}%", snapshot.drop_rate() * 100.0);
//! ```

// Domain layer - pure admission logic
pub mod domain;

// Application layer - coordination
pub mod application;

// Infrastructure layer - adapters and construction
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    bucket::{BucketState, Withdrawal},
    deque::{BoundedDeque, CursorMut, Iter, NodeId, DEFAULT_CAPACITY},
    error::ThrottleError,
    interval::parse_interval,
    outcome::Outcome,
    policy::{DropPolicy, QueueOrder},
    window::FixedWindow,
};

pub use application::{
    gate::{CancelHandle, ConcurrencyGate, Done, DoneHook, ErrorHandler, GateConfig, Slot, Ticket},
    metrics::{Metrics, MetricsSnapshot},
    ports::Clock,
    rate_limiter::{RateLimiter, RemoveOutcome},
    throttle::{Throttle, Throttled, ThrottledCallback},
    token_bucket::TokenBucket,
};

pub use infrastructure::{
    builder::ThrottleBuilder,
    clock::{RuntimeClock, SystemClock},
};
