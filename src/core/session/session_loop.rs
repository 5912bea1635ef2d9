use crate::core::protocol::framing::{auto_ack_payload, frame, MessageTemplate};
use crate::core::session::event::{EventSink, SessionEvent};
use crate::core::session::state::{SessionState, SessionStatistics, StatisticsCounters};
use crate::domain::config::SessionSettings;
use crate::domain::error::{SimError, SimResult};
use crate::infrastructure::transport::{self, ByteWriter, Chunk, Transport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Background connection to one LIS peer
///
/// Owns its transport for its whole running life and reports everything
/// through an [`EventSink`]. Built `Idle`; [`start`](Self::start) spawns the
/// receive cycle on the current tokio runtime; [`stop`](Self::stop) cancels
/// it and waits for it to exit. A stopped loop cannot be restarted.
pub struct SessionLoop {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// State visible to both the caller and the receive cycle
struct Shared {
    id: String,
    settings: SessionSettings,
    sink: Box<dyn EventSink>,
    /// Cleared by `stop` or by a fatal receive error
    running: AtomicBool,
    state: watch::Sender<SessionState>,
    /// Outbound half; the lock also serializes concurrent sends
    writer: Mutex<Option<Box<dyn ByteWriter>>>,
    local_addr: watch::Sender<Option<SocketAddr>>,
    stats: StatisticsCounters,
}

impl SessionLoop {
    pub fn new(settings: SessionSettings, sink: impl EventSink) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let (state, _) = watch::channel(SessionState::Idle);
        let (local_addr, _) = watch::channel(None);

        debug!(session = %id, "Session created for {}", settings.connection.describe());

        Self {
            shared: Arc::new(Shared {
                id,
                settings,
                sink: Box::new(sink),
                running: AtomicBool::new(false),
                state,
                writer: Mutex::new(None),
                local_addr,
                stats: StatisticsCounters::default(),
            }),
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Session loop publishing into a fresh unbounded channel
    pub fn with_channel(settings: SessionSettings) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(settings, tx), rx)
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.shared.settings
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions, e.g. to wait for the loop to stop on its own.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Address a server-role session is listening on, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr.borrow()
    }

    /// Wait until a server-role session has bound its listener.
    ///
    /// Returns `None` if the loop stopped before binding.
    pub async fn listening_addr(&self) -> Option<SocketAddr> {
        let mut addr_rx = self.shared.local_addr.subscribe();
        let mut state_rx = self.shared.state.subscribe();
        loop {
            let bound = *addr_rx.borrow_and_update();
            if bound.is_some() {
                return bound;
            }
            let state = *state_rx.borrow_and_update();
            if state.is_terminal() {
                return None;
            }
            tokio::select! {
                changed = addr_rx.changed() => if changed.is_err() { return None; },
                changed = state_rx.changed() => if changed.is_err() { return None; },
            }
        }
    }

    pub fn statistics(&self) -> SessionStatistics {
        self.shared.stats.snapshot()
    }

    /// Spawn the connect-and-receive cycle. Valid only once, from `Idle`.
    pub fn start(&mut self) -> SimResult<()> {
        let current = self.state();
        if current != SessionState::Idle {
            return Err(SimError::InvalidState {
                message: format!("Cannot start a session in state {}", current),
            });
        }

        self.shared.set_state(SessionState::Connecting);
        info!(session = %self.shared.id, "Starting session: {}", self.shared.settings.connection.describe());

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(run(shared, cancel)));
        Ok(())
    }

    /// Frame `message` for the session protocol and write it.
    ///
    /// Emits `"Sent: ..."` or `"Send error: ..."`. A failed send never ends
    /// the session.
    pub async fn send(&self, message: &str) -> SimResult<()> {
        self.shared.send(message).await
    }

    pub async fn send_template(&self, template: MessageTemplate) -> SimResult<()> {
        let payload = template.payload(self.shared.settings.protocol);
        self.shared.send(payload).await
    }

    /// Cancel the session and wait for the receive cycle to exit.
    ///
    /// Emits `"Connection closed"` when it ends a connecting or running
    /// session. No-op on a stopped session.
    pub async fn stop(&mut self) {
        match self.state() {
            SessionState::Idle => {
                self.shared.set_state(SessionState::Stopped);
                return;
            }
            SessionState::Stopped => {
                // The cycle ended by itself; just reap the task.
                if let Some(handle) = self.handle.take() {
                    if let Err(e) = handle.await {
                        warn!(session = %self.shared.id, "Receive task ended abnormally: {}", e);
                    }
                }
                return;
            }
            SessionState::Connecting | SessionState::Running => {}
        }

        self.shared.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(session = %self.shared.id, "Receive task ended abnormally: {}", e);
            }
        }

        // The cycle closes the writer on every exit path; this covers a panicked task.
        if let Some(mut writer) = self.shared.writer.lock().await.take() {
            writer.close().await;
        }

        let already_stopped = self.state() == SessionState::Stopped;
        self.shared.set_state(SessionState::Stopped);
        if !already_stopped {
            self.shared.sink.emit(SessionEvent::closed());
            info!(session = %self.shared.id, "Session stopped");
        }
    }
}

impl Drop for SessionLoop {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    async fn send(&self, message: &str) -> SimResult<()> {
        let framed = frame(self.settings.protocol, message);

        let result = {
            let mut guard = self.writer.lock().await;
            match guard.as_mut() {
                Some(writer) if self.running.load(Ordering::SeqCst) => writer.send_bytes(&framed).await,
                _ => Err(SimError::send("Not connected")),
            }
        };

        match result {
            Ok(()) => {
                self.stats.record_sent(framed.len());
                self.sink.emit(SessionEvent::sent(&framed));
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, "Send failed: {}", e);
                self.stats.record_send_error();
                self.sink.emit(SessionEvent::send_error(e.status_text()));
                Err(e)
            }
        }
    }

    /// End the session after a fatal error.
    fn fail(&self, error: &SimError) {
        error!(session = %self.id, "{}", error);
        self.running.store(false, Ordering::SeqCst);
        self.sink.emit(SessionEvent::error(error.status_text()));
        self.set_state(SessionState::Stopped);
    }
}

async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let on_listening = |addr: SocketAddr| {
        shared.local_addr.send_replace(Some(addr));
    };

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(session = %shared.id, "Cancelled while connecting");
            return;
        }
        result = transport::open(&shared.settings.connection, &*shared.sink, &on_listening) => result,
    };

    let Transport { mut reader, writer, connected_status } = match opened {
        Ok(transport) => transport,
        Err(e) => {
            shared.fail(&e);
            return;
        }
    };

    // Install the writer before announcing the link so a caller reacting to
    // the status can send immediately.
    *shared.writer.lock().await = Some(writer);
    shared.running.store(true, Ordering::SeqCst);
    shared.set_state(SessionState::Running);
    shared.sink.emit(SessionEvent::status(connected_status));

    let mut failure = None;
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            chunk = reader.receive_chunk() => chunk,
        };

        match chunk {
            Ok(Chunk::Data(text)) => {
                shared.stats.record_received(text.len());
                shared.sink.emit(SessionEvent::DataReceived(text));

                if shared.settings.auto_respond {
                    // Failure is reported as a send error event; the cycle goes on.
                    let _ = shared.send(auto_ack_payload(shared.settings.protocol)).await;
                }
            }
            Ok(Chunk::Idle) => continue,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    if failure.is_some() {
        shared.running.store(false, Ordering::SeqCst);
    }

    reader.close().await;
    if let Some(mut writer) = shared.writer.lock().await.take() {
        writer.close().await;
    }

    if let Some(e) = failure {
        shared.fail(&e);
    }
    debug!(session = %shared.id, "Receive cycle exited");
}
