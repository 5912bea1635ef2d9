use super::{decode, ByteWriter, Chunk, ChunkReader, Transport};
use crate::core::protocol::control::LF;
use crate::core::session::event::STATUS_SERIAL_CONNECTED;
use crate::domain::error::{SimError, SimResult};
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type PortHandle = Box<dyn SerialPort>;
type LineRead = (PortHandle, Vec<u8>, io::Result<Option<Vec<u8>>>);

/// Open `device_path` at `baud_rate`, 8N1, no flow control.
///
/// `read_timeout` bounds a single line read so the receive cycle can notice a
/// stop request.
pub async fn open(device_path: &str, baud_rate: u32, read_timeout: Duration) -> SimResult<Transport> {
    let path = device_path.to_string();
    let opened = tokio::task::spawn_blocking(move || -> Result<(PortHandle, PortHandle), serialport::Error> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(read_timeout)
            .open()?;
        let writer = port.try_clone()?;
        Ok((port, writer))
    })
    .await
    .map_err(|e| SimError::connect(format!("Serial open task failed: {}", e)))?;

    let (port, writer) = opened.map_err(|e| {
        SimError::connect(format!("Failed to open serial port {}: {}", device_path, e))
    })?;

    info!("Opened serial port: {} at {} baud", device_path, baud_rate);

    Ok(Transport {
        reader: Box::new(SerialReader {
            idle: Some((port, Vec::new())),
            in_flight: None,
            timeout: read_timeout,
        }),
        writer: Box::new(SerialWriter { port: Some(writer) }),
        connected_status: STATUS_SERIAL_CONNECTED.to_string(),
    })
}

/// Byte source whose blocking read timeout can be adjusted between reads
pub(crate) trait TimedRead: Read {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl TimedRead for dyn SerialPort {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// Read one `LF`-terminated line, bounded by `timeout`.
///
/// Each read is given only the time left before the deadline. Bytes past the
/// terminator stay in `pending` for the next call. When the timeout expires a
/// partial line is returned as-is; with nothing buffered the result is `None`.
pub(crate) fn read_line<R: TimedRead + ?Sized>(
    port: &mut R,
    pending: &mut Vec<u8>,
    timeout: Duration,
) -> io::Result<Option<Vec<u8>>> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 256];

    loop {
        if let Some(line) = take_line(pending) {
            return Ok(Some(line));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        port.set_read_timeout(remaining)?;
        match port.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    if let Some(line) = take_line(pending) {
        return Ok(Some(line));
    }
    if pending.is_empty() {
        Ok(None)
    } else {
        Ok(Some(std::mem::take(pending)))
    }
}

fn take_line(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = pending.iter().position(|&b| b == LF)?;
    Some(pending.drain(..=end).collect())
}

/// Inbound half of a serial link
///
/// Each read runs on the blocking pool. The port travels into the blocking
/// task and back, so an abandoned receive leaves its read in `in_flight` and
/// the next call picks up the result.
struct SerialReader {
    idle: Option<(PortHandle, Vec<u8>)>,
    in_flight: Option<JoinHandle<LineRead>>,
    timeout: Duration,
}

impl SerialReader {
    async fn finish_in_flight(&mut self) -> SimResult<Option<io::Result<Option<Vec<u8>>>>> {
        let Some(handle) = self.in_flight.as_mut() else {
            return Ok(None);
        };
        let joined = handle.await;
        self.in_flight = None;

        let (port, pending, result) =
            joined.map_err(|e| SimError::receive(format!("Serial read task failed: {}", e)))?;
        self.idle = Some((port, pending));
        Ok(Some(result))
    }
}

#[async_trait]
impl ChunkReader for SerialReader {
    async fn receive_chunk(&mut self) -> SimResult<Chunk> {
        if self.in_flight.is_none() {
            let (mut port, mut pending) = self
                .idle
                .take()
                .ok_or_else(|| SimError::receive("Transport is closed"))?;
            let timeout = self.timeout;
            self.in_flight = Some(tokio::task::spawn_blocking(move || {
                let result = read_line(&mut *port, &mut pending, timeout);
                (port, pending, result)
            }));
        }

        match self.finish_in_flight().await? {
            Some(Ok(Some(line))) => {
                debug!("Received {} bytes over serial", line.len());
                Ok(Chunk::Data(decode(&line)))
            }
            Some(Ok(None)) | None => Ok(Chunk::Idle),
            Some(Err(e)) => Err(SimError::receive(e.to_string())),
        }
    }

    async fn close(&mut self) {
        // Wait out a pending read (bounded by the read timeout) so the port is
        // really released when close returns.
        if let Err(e) = self.finish_in_flight().await {
            warn!("Serial reader close: {}", e);
        }
        self.idle = None;
    }
}

/// Outbound half of a serial link, a cloned handle of the same device
struct SerialWriter {
    port: Option<PortHandle>,
}

#[async_trait]
impl ByteWriter for SerialWriter {
    async fn send_bytes(&mut self, payload: &[u8]) -> SimResult<()> {
        let mut port = self
            .port
            .take()
            .ok_or_else(|| SimError::send("Transport is closed"))?;
        let data = payload.to_vec();

        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = port.write_all(&data).and_then(|_| port.flush());
            (port, result)
        })
        .await
        .map_err(|e| SimError::send(format!("Serial write task failed: {}", e)))?;

        self.port = Some(port);
        result.map_err(|e| SimError::send(e.to_string()))?;

        debug!("Sent {} bytes over serial", payload.len());
        Ok(())
    }

    async fn close(&mut self) {
        self.port = None;
    }
}
