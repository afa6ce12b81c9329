//! Observable broker events

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Broker lifecycle
    /// Configuration loaded
    ConfigLoaded,
    /// Broker startup begins
    BrokerStart,
    /// All workers spawned
    BrokerServing,
    /// Shutdown initiated
    BrokerShutdown,

    // Worker lifecycle
    /// Worker connected and entering its receive loop
    WorkerStarted,
    /// Worker left its receive loop
    WorkerEnded,
    /// Worker failed on a transport fault
    TransportFault,

    // Write path
    /// Inbound frame discarded as malformed
    FrameDropped,
    /// Topic log append failed, worker stops
    StoreFailed,
    /// Acknowledgment sent
    AckSent,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::BrokerStart => "BROKER_START",
            Event::BrokerServing => "BROKER_SERVING",
            Event::BrokerShutdown => "BROKER_SHUTDOWN",
            Event::WorkerStarted => "WORKER_STARTED",
            Event::WorkerEnded => "WORKER_ENDED",
            Event::TransportFault => "TRANSPORT_FAULT",
            Event::FrameDropped => "FRAME_DROPPED",
            Event::StoreFailed => "STORE_FAILED",
            Event::AckSent => "ACK_SENT",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::AckSent => Severity::Trace,
            Event::FrameDropped => Severity::Warn,
            Event::StoreFailed | Event::TransportFault => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_are_upper_snake_case() {
        let events = [
            Event::ConfigLoaded,
            Event::BrokerStart,
            Event::BrokerServing,
            Event::BrokerShutdown,
            Event::WorkerStarted,
            Event::WorkerEnded,
            Event::TransportFault,
            Event::FrameDropped,
            Event::StoreFailed,
            Event::AckSent,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failures_are_errors() {
        assert_eq!(Event::StoreFailed.severity(), Severity::Error);
        assert_eq!(Event::TransportFault.severity(), Severity::Error);
        assert_eq!(Event::FrameDropped.severity(), Severity::Warn);
        assert_eq!(Event::WorkerStarted.severity(), Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(Event::StoreFailed.to_string(), "STORE_FAILED");
    }
}
