//! Mock implementations for testing.
//!
//! Test doubles for the clock port and a capturing tracing layer.

pub mod clock;
pub mod layer;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
