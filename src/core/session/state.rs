use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a session loop
///
/// `Idle -> Connecting -> Running -> Stopped`. A failed connect goes straight
/// from `Connecting` to `Stopped`; failure is told apart only by the status
/// event text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Constructed, not yet started
    Idle,
    /// Opening the transport
    Connecting,
    /// Receive cycle active
    Running,
    /// Terminal; a new loop must be built to reconnect
    Stopped,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Running => write!(f, "Running"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Snapshot of session traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatistics {
    /// Total bytes sent, framing included
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Frames written
    pub messages_sent: u64,
    /// Data events emitted
    pub messages_received: u64,
    /// Failed sends
    pub send_errors: u64,
}

/// Lock-free counters shared between the caller and the receive cycle
#[derive(Debug, Default)]
pub(crate) struct StatisticsCounters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    send_errors: AtomicU64,
}

impl StatisticsCounters {
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStatistics {
        SessionStatistics {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Connecting.is_active());
        assert!(SessionState::Running.is_active());
        assert!(SessionState::Stopped.is_terminal());
        assert_eq!(SessionState::Running.to_string(), "Running");
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = StatisticsCounters::default();
        counters.record_sent(5);
        counters.record_sent(3);
        counters.record_received(10);
        counters.record_send_error();

        let stats = counters.snapshot();
        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.bytes_sent, 8);
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.bytes_received, 10);
        assert_eq!(stats.send_errors, 1);
    }
}
