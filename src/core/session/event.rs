//! Outward notifications of a session loop.
//!
//! Events are the only channel from the loop back to its caller. Status text
//! follows fixed patterns because front ends match on the substrings
//! `"Connected"`, `"Error"` and `"closed"`.

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

pub const STATUS_TCP_CLIENT_CONNECTED: &str = "Connected via TCP/IP (Client)";
pub const STATUS_SERIAL_CONNECTED: &str = "Connected via Serial";
pub const STATUS_SERVER_WAITING: &str = "Server started, waiting for connection...";
pub const STATUS_CONNECTION_CLOSED: &str = "Connection closed";

/// Notification produced by a session loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "text")]
pub enum SessionEvent {
    DataReceived(String),
    StatusChanged(String),
}

impl SessionEvent {
    pub fn status(text: impl Into<String>) -> Self {
        SessionEvent::StatusChanged(text.into())
    }

    pub fn peer_connected(peer: impl fmt::Display) -> Self {
        SessionEvent::StatusChanged(format!("Connected to {}", peer))
    }

    pub fn error(detail: impl fmt::Display) -> Self {
        SessionEvent::StatusChanged(format!("Error: {}", detail))
    }

    pub fn sent(framed: &[u8]) -> Self {
        SessionEvent::StatusChanged(format!("Sent: {}", String::from_utf8_lossy(framed)))
    }

    pub fn send_error(detail: impl fmt::Display) -> Self {
        SessionEvent::StatusChanged(format!("Send error: {}", detail))
    }

    pub fn closed() -> Self {
        SessionEvent::StatusChanged(STATUS_CONNECTION_CLOSED.to_string())
    }

    pub fn text(&self) -> &str {
        match self {
            SessionEvent::DataReceived(text) | SessionEvent::StatusChanged(text) => text,
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self, SessionEvent::StatusChanged(_))
    }
}

/// Receiver of session events
///
/// Implementations must not block; they run on the loop's own task.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: SessionEvent);
}

impl EventSink for mpsc::UnboundedSender<SessionEvent> {
    fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.send(event);
    }
}

impl<F> EventSink for F
where
    F: Fn(SessionEvent) + Send + Sync + 'static,
{
    fn emit(&self, event: SessionEvent) {
        self(event)
    }
}

/// Coarse link state shown to an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionIndicator {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionIndicator {
    /// Indicator implied by a status line, or `None` when it leaves the indicator unchanged.
    pub fn from_status(text: &str) -> Option<Self> {
        if text.contains("Connected") {
            Some(ConnectionIndicator::Connected)
        } else if text.contains("Error") || text.to_lowercase().contains("closed") {
            Some(ConnectionIndicator::Disconnected)
        } else {
            None
        }
    }
}

impl fmt::Display for ConnectionIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionIndicator::Connecting => write!(f, "Connecting"),
            ConnectionIndicator::Connected => write!(f, "Connected"),
            ConnectionIndicator::Disconnected => write!(f, "Disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_status_patterns() {
        assert_eq!(SessionEvent::peer_connected("127.0.0.1:4000").text(), "Connected to 127.0.0.1:4000");
        assert_eq!(SessionEvent::error("refused").text(), "Error: refused");
        assert_eq!(SessionEvent::sent(b"\x02ACK\x03").text(), "Sent: \u{2}ACK\u{3}");
        assert_eq!(SessionEvent::send_error("broken pipe").text(), "Send error: broken pipe");
        assert_eq!(SessionEvent::closed().text(), "Connection closed");
    }

    #[test]
    fn test_indicator_from_status() {
        let cases = [
            (STATUS_TCP_CLIENT_CONNECTED, Some(ConnectionIndicator::Connected)),
            (STATUS_SERIAL_CONNECTED, Some(ConnectionIndicator::Connected)),
            ("Connected to 10.0.0.2:5000", Some(ConnectionIndicator::Connected)),
            ("Error: Connection refused", Some(ConnectionIndicator::Disconnected)),
            (STATUS_CONNECTION_CLOSED, Some(ConnectionIndicator::Disconnected)),
            (STATUS_SERVER_WAITING, None),
            ("Sent: ACK", None),
        ];

        for (text, expected) in cases {
            assert_eq!(ConnectionIndicator::from_status(text), expected, "status {:?}", text);
        }
    }

    #[test]
    fn test_send_error_leaves_indicator_unchanged() {
        // Lowercase "error" and no "closed".
        assert_eq!(ConnectionIndicator::from_status("Send error: broken pipe"), None);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = move |event: SessionEvent| captured.lock().unwrap().push(event);

        sink.emit(SessionEvent::status("hello"));
        assert_eq!(seen.lock().unwrap().as_slice(), &[SessionEvent::status("hello")]);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.emit(SessionEvent::closed());
    }
}
