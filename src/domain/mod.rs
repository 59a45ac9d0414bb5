//! Domain layer - pure admission logic with no runtime dependencies.
//!
//! This layer contains the core data structures and arithmetic:
//! - Bounded circular deque used as the wait queue
//! - Token bucket and fixed-window counters
//! - Drop policies and queue order
//! - Call outcomes and the error taxonomy
//!
//! Every type here takes the current instant as an argument instead of
//! reading a clock, so it can be tested without a runtime.

pub mod bucket;
pub mod deque;
pub mod error;
pub mod interval;
pub mod outcome;
pub mod policy;
pub mod window;
