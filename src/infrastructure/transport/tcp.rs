use super::{decode, ByteWriter, Chunk, ChunkReader, Transport};
use crate::core::session::event::{EventSink, SessionEvent, STATUS_SERVER_WAITING, STATUS_TCP_CLIENT_CONNECTED};
use crate::domain::error::{SimError, SimResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tracing::{debug, info, warn};

/// Bytes pulled from the socket per receive call
pub const READ_BUFFER_SIZE: usize = 1024;

/// Only one LIS peer is ever accepted per session.
const LISTEN_BACKLOG: u32 = 1;

/// Connect to `host:port` as a client.
pub async fn connect(host: &str, port: u16, timeout: Duration) -> SimResult<Transport> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| SimError::connect(format!("Connection timeout to {}:{}", host, port)))?
        .map_err(|e| SimError::connect(format!("Failed to connect to {}:{}: {}", host, port, e)))?;

    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    info!("TCP connection established to {}:{}", host, port);
    Ok(split(stream, STATUS_TCP_CLIENT_CONNECTED.to_string()))
}

/// Listen on `bind_host:port` and wait for a single peer.
///
/// The listening socket is dropped once the peer is accepted.
pub async fn accept_one(
    bind_host: &str,
    port: u16,
    sink: &dyn EventSink,
    on_listening: &(dyn Fn(SocketAddr) + Send + Sync),
) -> SimResult<Transport> {
    let addr = tokio::net::lookup_host((bind_host, port))
        .await
        .map_err(|e| SimError::connect(format!("Failed to resolve {}:{}: {}", bind_host, port, e)))?
        .next()
        .ok_or_else(|| SimError::connect(format!("No address for {}:{}", bind_host, port)))?;

    let socket = (if addr.is_ipv4() { TcpSocket::new_v4() } else { TcpSocket::new_v6() })
        .map_err(|e| SimError::connect(format!("Failed to create socket: {}", e)))?;
    socket
        .set_reuseaddr(true)
        .map_err(|e| SimError::connect(format!("Failed to configure socket: {}", e)))?;
    socket
        .bind(addr)
        .map_err(|e| SimError::connect(format!("Failed to bind to {}: {}", addr, e)))?;
    let listener = socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| SimError::connect(format!("Failed to listen on {}: {}", addr, e)))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| SimError::connect(format!("Failed to get local address: {}", e)))?;
    on_listening(local_addr);

    info!("TCP server listening on {}", local_addr);
    sink.emit(SessionEvent::status(STATUS_SERVER_WAITING));

    let (stream, peer) = listener
        .accept()
        .await
        .map_err(|e| SimError::connect(format!("Failed to accept connection: {}", e)))?;

    info!("Accepted LIS peer {}", peer);
    Ok(split(stream, format!("Connected to {}", peer)))
}

fn split(stream: TcpStream, connected_status: String) -> Transport {
    let (read_half, write_half) = stream.into_split();
    Transport {
        reader: Box::new(TcpReader {
            half: Some(read_half),
            buffer: vec![0u8; READ_BUFFER_SIZE],
            carry: Vec::new(),
        }),
        writer: Box::new(TcpWriter { half: Some(write_half) }),
        connected_status,
    }
}

struct TcpReader {
    half: Option<OwnedReadHalf>,
    buffer: Vec<u8>,
    /// Incomplete UTF-8 sequence held back from the previous read
    carry: Vec<u8>,
}

#[async_trait]
impl ChunkReader for TcpReader {
    async fn receive_chunk(&mut self) -> SimResult<Chunk> {
        loop {
            let half = self
                .half
                .as_mut()
                .ok_or_else(|| SimError::receive("Transport is closed"))?;

            let n = half
                .read(&mut self.buffer)
                .await
                .map_err(|e| SimError::receive(e.to_string()))?;

            // A TCP read of zero bytes is an orderly shutdown by the peer, not a timeout.
            if n == 0 {
                if !self.carry.is_empty() {
                    let tail = std::mem::take(&mut self.carry);
                    return Ok(Chunk::Data(decode(&tail)));
                }
                info!("TCP connection closed by peer");
                return Err(SimError::receive("Connection closed by peer"));
            }

            debug!("Received {} bytes over TCP", n);
            self.carry.extend_from_slice(&self.buffer[..n]);
            let text = take_complete(&mut self.carry);
            if !text.is_empty() {
                return Ok(Chunk::Data(text));
            }
        }
    }

    async fn close(&mut self) {
        self.half = None;
        self.carry.clear();
    }
}

/// Decode `pending` up to any incomplete trailing UTF-8 sequence, which stays
/// in `pending`. Invalid bytes elsewhere become U+FFFD.
fn take_complete(pending: &mut Vec<u8>) -> String {
    let mut start = 0;
    let complete = loop {
        match std::str::from_utf8(&pending[start..]) {
            Ok(_) => break pending.len(),
            Err(e) => match e.error_len() {
                None => break start + e.valid_up_to(),
                Some(len) => start += e.valid_up_to() + len,
            },
        }
    };

    let tail = pending.split_off(complete);
    let text = decode(pending);
    *pending = tail;
    text
}

struct TcpWriter {
    half: Option<OwnedWriteHalf>,
}

#[async_trait]
impl ByteWriter for TcpWriter {
    async fn send_bytes(&mut self, payload: &[u8]) -> SimResult<()> {
        let half = self
            .half
            .as_mut()
            .ok_or_else(|| SimError::send("Transport is closed"))?;

        half.write_all(payload)
            .await
            .map_err(|e| SimError::send(e.to_string()))?;
        half.flush().await.map_err(|e| SimError::send(e.to_string()))?;

        debug!("Sent {} bytes over TCP", payload.len());
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut half) = self.half.take() {
            if let Err(e) = half.shutdown().await {
                debug!("TCP shutdown reported: {}", e);
            }
        }
    }
}
