//! Error taxonomy for the throttling subsystem.
//!
//! Shedding a caller under backpressure is not an error; it is reported as
//! [`Outcome::Dropped`](crate::domain::outcome::Outcome::Dropped).

use std::fmt;

/// Error returned by gate, bucket and limiter operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ThrottleError {
    /// The fixed-capacity wait queue is full and cannot grow
    QueueFull {
        /// Capacity of the queue at the time of the push
        capacity: usize,
    },
    /// More tokens were requested than the bucket can ever hold
    CapacityExceeded {
        /// Number of tokens requested
        requested: f64,
        /// Capacity of the bucket that rejected the request
        capacity: f64,
    },
    /// Malformed configuration or argument
    InvalidArgument(String),
    /// A user-supplied hook panicked while the gate was releasing a slot
    HookPanicked,
}

impl ThrottleError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ThrottleError::InvalidArgument(reason.into())
    }
}

impl fmt::Display for ThrottleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleError::QueueFull { capacity } => {
                write!(f, "wait queue is full (capacity {})", capacity)
            }
            ThrottleError::CapacityExceeded {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "requested {} tokens but the bucket holds at most {}",
                    requested, capacity
                )
            }
            ThrottleError::InvalidArgument(reason) => write!(f, "invalid argument: {}", reason),
            ThrottleError::HookPanicked => write!(f, "on_done hook panicked"),
        }
    }
}

impl std::error::Error for ThrottleError {}
