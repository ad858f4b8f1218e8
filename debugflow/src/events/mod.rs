//! Event sink system for observability.
//!
//! The executor reports every stage transition to an [`EventSink`]. The CLI
//! uses [`LoggingEventSink`]; tests use [`CollectingEventSink`] to assert on
//! ordering.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
