use analyzersim::core::protocol::framing::HL7_ACK_PAYLOAD;
use analyzersim::{
    frame, ConnectionConfig, ConnectionIndicator, ProtocolKind, SessionEvent, SessionLoop, SessionSettings,
    SessionState, SimError, TcpRole,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// End-to-end session tests over loopback TCP
#[cfg(test)]
mod integration_tests {
    use super::*;

    fn server_settings(protocol: ProtocolKind) -> SessionSettings {
        SessionSettings::new(
            protocol,
            ConnectionConfig::Tcp {
                role: TcpRole::Server,
                host: "localhost".to_string(),
                port: 0,
                connect_timeout_ms: 3000,
                bind_host: "127.0.0.1".to_string(),
            },
        )
    }

    async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
        timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn wait_stopped(session: &SessionLoop) {
        let mut state = session.subscribe_state();
        timeout(WAIT, state.wait_for(|s| s.is_terminal()))
            .await
            .expect("timed out waiting for stop")
            .expect("state channel closed");
    }

    /// Client session connected to a local listener, plus the accepted peer.
    async fn connected_client(
        protocol: ProtocolKind,
        auto_respond: bool,
    ) -> (SessionLoop, UnboundedReceiver<SessionEvent>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let settings = SessionSettings::new(protocol, ConnectionConfig::tcp_client("127.0.0.1", port))
            .with_auto_respond(auto_respond);
        let (mut session, mut events) = SessionLoop::with_channel(settings);
        session.start().unwrap();

        let (peer, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::status("Connected via TCP/IP (Client)")
        );
        assert!(session.is_running());
        (session, events, peer)
    }

    #[tokio::test]
    async fn test_client_connect_refused_reports_single_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let settings = SessionSettings::new(ProtocolKind::Astm, ConnectionConfig::tcp_client("127.0.0.1", port));
        let (mut session, mut events) = SessionLoop::with_channel(settings);
        session.start().unwrap();

        let event = next_event(&mut events).await;
        assert!(event.text().starts_with("Error: "), "got {:?}", event);
        assert_eq!(
            ConnectionIndicator::from_status(event.text()),
            Some(ConnectionIndicator::Disconnected)
        );

        wait_stopped(&session).await;
        assert!(!session.is_running());

        // A loop that stopped itself reports nothing more on stop.
        session.stop().await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_server_reports_waiting_peer_and_data() {
        let (mut session, mut events) = SessionLoop::with_channel(server_settings(ProtocolKind::Astm));
        session.start().unwrap();

        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::status("Server started, waiting for connection...")
        );
        let addr = session.listening_addr().await.expect("server did not bind");

        let mut peer = TcpStream::connect(addr).await.unwrap();
        let connected = next_event(&mut events).await;
        assert!(connected.text().starts_with("Connected to 127.0.0.1:"), "got {:?}", connected);
        assert_eq!(session.state(), SessionState::Running);

        peer.write_all(b"HELLO\n").await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::DataReceived("HELLO\n".to_string())
        );

        session.stop().await;
        assert_eq!(next_event(&mut events).await, SessionEvent::status("Connection closed"));
        assert_eq!(session.statistics().messages_received, 1);
        assert_eq!(session.statistics().bytes_received, 6);
    }

    #[tokio::test]
    async fn test_astm_auto_respond_acknowledges_each_message() {
        let (mut session, mut events, mut peer) = connected_client(ProtocolKind::Astm, true).await;

        peer.write_all(b"H|1\r").await.unwrap();

        let mut ack = [0u8; 5];
        timeout(WAIT, peer.read_exact(&mut ack)).await.unwrap().unwrap();
        assert_eq!(&ack, b"\x02ACK\x03");

        assert_eq!(next_event(&mut events).await, SessionEvent::DataReceived("H|1\r".to_string()));
        assert_eq!(next_event(&mut events).await, SessionEvent::status("Sent: \u{2}ACK\u{3}"));

        session.stop().await;
    }

    #[tokio::test]
    async fn test_hl7_server_auto_respond() {
        let settings = server_settings(ProtocolKind::Hl7).with_auto_respond(true);
        let (mut session, mut events) = SessionLoop::with_channel(settings);
        session.start().unwrap();

        let addr = session.listening_addr().await.expect("server did not bind");
        let mut peer = TcpStream::connect(addr).await.unwrap();
        peer.write_all(b"\x0bMSH|^~\\&|LIS||SIM||20250225||ORU^R01|||2.5\x1c\x0d")
            .await
            .unwrap();

        let expected = frame(ProtocolKind::Hl7, HL7_ACK_PAYLOAD);
        let mut ack = vec![0u8; expected.len()];
        timeout(WAIT, peer.read_exact(&mut ack)).await.unwrap().unwrap();
        assert_eq!(ack, expected);
        assert_eq!(ack[0], 0x0B);
        assert_eq!(&ack[ack.len() - 2..], &[0x1C, 0x0D]);

        session.stop().await;
        let mut saw_closed = false;
        while let Ok(event) = events.try_recv() {
            saw_closed |= event == SessionEvent::status("Connection closed");
        }
        assert!(saw_closed);
    }

    #[tokio::test]
    async fn test_send_frames_for_session_protocol() {
        let (mut session, mut events, mut peer) = connected_client(ProtocolKind::Astm, false).await;

        tokio_test::assert_ok!(session.send("H|1").await);

        let mut framed = [0u8; 5];
        timeout(WAIT, peer.read_exact(&mut framed)).await.unwrap().unwrap();
        assert_eq!(&framed, b"\x02H|1\x03");
        assert_eq!(next_event(&mut events).await, SessionEvent::status("Sent: \u{2}H|1\u{3}"));

        let stats = session.statistics();
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.bytes_sent, 5);

        session.stop().await;
    }

    #[tokio::test]
    async fn test_stop_emits_closed_once() {
        let (mut session, mut events, _peer) = connected_client(ProtocolKind::Hl7, false).await;

        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.is_running());
        assert_eq!(next_event(&mut events).await, SessionEvent::status("Connection closed"));

        session.stop().await;
        assert!(events.try_recv().is_err());
        assert!(matches!(session.start(), Err(SimError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_peer_disconnect_ends_session_and_send_fails() {
        let (session, mut events, peer) = connected_client(ProtocolKind::Astm, false).await;
        drop(peer);

        let event = next_event(&mut events).await;
        assert!(event.text().starts_with("Error: "), "got {:?}", event);
        wait_stopped(&session).await;

        let result = session.send("H|1").await;
        assert!(matches!(result, Err(SimError::Send { .. })));
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::status("Send error: Not connected")
        );
    }

    #[tokio::test]
    async fn test_stop_while_server_waits() {
        let (mut session, mut events) = SessionLoop::with_channel(server_settings(ProtocolKind::Astm));
        session.start().unwrap();
        session.listening_addr().await.expect("server did not bind");

        timeout(WAIT, session.stop()).await.expect("stop hung while waiting for a peer");
        assert_eq!(session.state(), SessionState::Stopped);

        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::status("Server started, waiting for connection...")
        );
        assert_eq!(next_event(&mut events).await, SessionEvent::status("Connection closed"));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closure_sink_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |event: SessionEvent| seen.lock().unwrap().push(event)
        };

        let settings = SessionSettings::new(
            ProtocolKind::Astm,
            ConnectionConfig::serial("/dev/analyzersim-missing-device", 9600),
        );
        let mut session = SessionLoop::new(settings, sink);
        session.start().unwrap();
        wait_stopped(&session).await;
        session.stop().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].text().starts_with("Error: "), "got {:?}", seen[0]);
    }
}
