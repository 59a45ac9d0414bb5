//! Infrastructure layer - adapters and construction.
//!
//! This layer provides:
//! - Clock adapters (system time, tokio runtime time)
//! - The `Throttle` builder

pub mod builder;
pub mod clock;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// task-throttle = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
