//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use std::fmt::Debug;
use std::time::Instant;

/// Port for obtaining current time.
///
/// Buckets and limiters read time only through this trait, so tests can drive
/// refill arithmetic without sleeping. Infrastructure provides concrete
/// implementations (`SystemClock`, `RuntimeClock`, `MockClock`).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}
