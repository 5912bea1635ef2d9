//! Byte-stream endpoints behind a uniform open / receive / send / close surface.
//!
//! A [`Transport`] is split into a reader and a writer half at open time so the
//! receive cycle and outbound sends work on disjoint directions of the same
//! link without contending for one lock.

pub mod serial;
pub mod tcp;

use crate::core::session::event::EventSink;
use crate::domain::config::{ConnectionConfig, TcpRole};
use crate::domain::error::{SimError, SimResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

/// Outcome of one receive attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Decoded inbound text
    Data(String),
    /// Bounded read timed out with nothing to report
    Idle,
}

/// Inbound half of a transport
#[async_trait]
pub trait ChunkReader: Send {
    /// One blocking read. Peer loss and I/O failures are errors, never `Idle`.
    ///
    /// Must be cancel-safe: dropping the returned future and calling again
    /// must not lose data.
    async fn receive_chunk(&mut self) -> SimResult<Chunk>;

    /// Release the handle. Idempotent.
    async fn close(&mut self);
}

/// Outbound half of a transport
#[async_trait]
pub trait ByteWriter: Send {
    /// Write the whole payload once.
    async fn send_bytes(&mut self, payload: &[u8]) -> SimResult<()>;

    /// Release the handle. Idempotent.
    async fn close(&mut self);
}

/// An established link
pub struct Transport {
    pub reader: Box<dyn ChunkReader>,
    pub writer: Box<dyn ByteWriter>,
    /// Status line announcing the link, e.g. `"Connected via Serial"`
    pub connected_status: String,
}

impl Transport {
    pub async fn close(mut self) {
        self.reader.close().await;
        self.writer.close().await;
    }
}

/// Establish the endpoint described by `config`.
///
/// In server role this waits, without timeout, for exactly one peer. The
/// waiting status is emitted through `sink` and the bound address reported
/// through `on_listening` before the wait begins.
pub async fn open(
    config: &ConnectionConfig,
    sink: &dyn EventSink,
    on_listening: &(dyn Fn(SocketAddr) + Send + Sync),
) -> SimResult<Transport> {
    config
        .validate()
        .map_err(|e| SimError::connect(e.status_text()))?;

    match config {
        ConnectionConfig::Tcp { role: TcpRole::Client, host, port, connect_timeout_ms, .. } => {
            tcp::connect(host, *port, Duration::from_millis(*connect_timeout_ms)).await
        }
        ConnectionConfig::Tcp { role: TcpRole::Server, bind_host, port, .. } => {
            tcp::accept_one(bind_host, *port, sink, on_listening).await
        }
        ConnectionConfig::Serial { device_path, baud_rate, read_timeout_ms } => {
            serial::open(device_path, *baud_rate, Duration::from_millis(*read_timeout_ms)).await
        }
    }
}

/// Decode inbound bytes; invalid UTF-8 becomes U+FFFD instead of failing the session.
pub(crate) fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::event::SessionEvent;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        let config = ConnectionConfig::tcp_client("", 5000);

        let result = open(&config, &tx, &|_: SocketAddr| {}).await;
        assert!(matches!(result, Err(SimError::Connect { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_decode_is_lossy() {
        assert_eq!(decode(b"HELLO\n"), "HELLO\n");
        assert_eq!(decode(&[0x41, 0xFF, 0x42]), "A\u{FFFD}B");
    }
}
