//! Application layer - coordination of concurrent callers.
//!
//! This layer turns the domain arithmetic into shared, awaitable primitives:
//! - Token buckets with hierarchical parents
//! - Fixed-window rate limiter
//! - Concurrency gate with a policy-driven wait queue
//! - Throttle composing the rate limiter and the gate
//!
//! ## Ports
//!
//! Time is read through the [`ports::Clock`] port so infrastructure can supply
//! the system clock, the runtime clock or a mock.

pub mod gate;
pub mod metrics;
pub mod ports;
pub mod rate_limiter;
pub mod throttle;
pub mod token_bucket;
