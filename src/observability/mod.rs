//! Observability for the broker
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle and write-path events
//! - Per-worker counters
//!
//! Observability never changes write-path behavior: logging failures are
//! swallowed and counters are relaxed atomics.
//!
//! # Usage
//!
//! ```ignore
//! use zper::observability::{log_event, log_event_with_fields, Event};
//!
//! log_event(Event::BrokerStart);
//! log_event_with_fields(Event::WorkerStarted, &[("identity", "writer-1")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_LEVEL_ENV};
pub use metrics::{MetricsSnapshot, WorkerMetrics};

/// Log an event without fields
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

/// Log an event at a severity other than its default
pub fn log_event_at(event: Event, severity: Severity, fields: &[(&str, &str)]) {
    Logger::log(severity, event.as_str(), fields);
}
