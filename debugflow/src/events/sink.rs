//! Event sink trait and implementations.

use tracing::debug;

/// Trait for event sinks that receive stage lifecycle events.
///
/// The executor emits `stage.started`, `stage.completed`, `stage.skipped`,
/// `stage.failed` and `stage.cancelled`, plus `pipeline.started` and
/// `pipeline.completed` around a run.
pub trait EventSink: Send + Sync {
    /// Emits an event without blocking.
    ///
    /// Must never fail; errors are logged and suppressed.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// An event sink that forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        debug!(event_type = %event_type, event_data = ?data, "Event: {}", event_type);
    }
}

/// A collecting event sink, mostly for tests asserting on ordering.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
    }

    /// Returns the index of the first `event_type` event whose `stage` field
    /// equals `stage`.
    #[must_use]
    pub fn position(&self, event_type: &str, stage: &str) -> Option<usize> {
        self.events.read().iter().position(|(t, data)| {
            t == event_type
                && data
                    .as_ref()
                    .and_then(|d| d.get("stage"))
                    .and_then(serde_json::Value::as_str)
                    == Some(stage)
        })
    }

    /// Returns the stage names carried by events of the given type, in order.
    #[must_use]
    pub fn stages_with(&self, event_type: &str) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t == event_type)
            .filter_map(|(_, data)| {
                data.as_ref()
                    .and_then(|d| d.get("stage"))
                    .and_then(serde_json::Value::as_str)
                    .map(String::from)
            })
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}
