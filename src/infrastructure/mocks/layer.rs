//! Capturing tracing layer for asserting on admission logs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Level;
use tracing_subscriber::Layer;

/// Layer that records every event it sees.
///
/// Tests install it with `tracing_subscriber::registry().with(layer.clone())`
/// and inspect the clone afterwards.
#[derive(Clone, Default)]
pub struct MockCaptureLayer {
    captured: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// Captured event information.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
}

impl MockCaptureLayer {
    /// Create a new mock capture layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured events.
    pub fn get_captured(&self) -> Vec<CapturedEvent> {
        self.events().clone()
    }

    /// Get the count of captured events.
    pub fn count(&self) -> usize {
        self.events().len()
    }

    /// Count captured events at exactly `level`.
    pub fn count_at(&self, level: Level) -> usize {
        self.events().iter().filter(|e| e.level == level).count()
    }

    /// Check if any captured message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.events().iter().any(|e| e.message.contains(needle))
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.events().clear();
    }

    fn events(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Layer<S> for MockCaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        self.events().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
        });
    }
}

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_captures_level_and_message() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(in_flight = 0, "slot released twice");
        });

        assert_eq!(capture.count(), 1);
        assert_eq!(capture.count_at(Level::WARN), 1);
        assert!(capture.contains("released twice"));

        capture.clear();
        assert_eq!(capture.count(), 0);
    }
}
