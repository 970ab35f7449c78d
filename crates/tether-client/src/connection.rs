//! WebSocket connection lifecycle — connect, send, event delivery, close.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use tether_core::protocol::ClientEnvelope;
use tether_core::types::{CloseReason, ConnectionState, Payload};

use crate::error::{ConnectError, SendError, SessionError, TransportError};

/// Lifecycle and inbound-frame events for one session.
///
/// `Opened`, `Closed`, and `Failed` each fire at most once; `Message`
/// fires once per inbound frame, in arrival order, verbatim. Nothing
/// fires after a terminal event.
#[derive(Debug)]
pub enum SessionEvent {
    /// Transport handshake completed; sends are now accepted.
    Opened,
    /// One inbound frame, never buffered or coalesced.
    Message(Payload),
    /// Graceful termination by either side.
    Closed(Option<CloseReason>),
    /// Transport failure; the state is already terminal when this fires.
    Failed(SessionError),
}

/// Ordered subscription to a connection's events.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

enum OutboundFrame {
    Envelope(String),
    Close,
}

/// Atomic [`ConnectionState`] cell shared with the transport task.
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(encode(ConnectionState::Idle)))
    }

    fn load(&self) -> ConnectionState {
        decode(self.0.load(Ordering::SeqCst))
    }

    fn store(&self, state: ConnectionState) {
        self.0.store(encode(state), Ordering::SeqCst);
    }

    /// Transition `from` -> `to`, or report the actual state.
    fn transition(&self, from: ConnectionState, to: ConnectionState) -> Result<(), ConnectionState> {
        self.0
            .compare_exchange(encode(from), encode(to), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(decode)
    }
}

fn encode(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Idle => 0,
        ConnectionState::Connecting => 1,
        ConnectionState::Open => 2,
        ConnectionState::Closed => 3,
        ConnectionState::Failed => 4,
    }
}

fn decode(value: u8) -> ConnectionState {
    match value {
        0 => ConnectionState::Idle,
        1 => ConnectionState::Connecting,
        2 => ConnectionState::Open,
        3 => ConnectionState::Closed,
        _ => ConnectionState::Failed,
    }
}

/// Owns one client connection from `connect` to a terminal state.
///
/// One session per instance: `Closed` and `Failed` are final, and a second
/// `connect` is a state conflict. Dropping the connection closes the
/// transport.
pub struct Connection {
    endpoint: String,
    state: Arc<StateCell>,
    outbound_tx: mpsc::UnboundedSender<OutboundFrame>,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundFrame>>,
}

impl Connection {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            endpoint: endpoint.into(),
            state: Arc::new(StateCell::new()),
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        }
    }

    /// Endpoint this connection targets.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Start the transport and return the event subscription.
    ///
    /// Returns immediately; establishment success is observed as
    /// [`SessionEvent::Opened`], failure as [`SessionEvent::Failed`].
    pub fn connect(&mut self) -> Result<EventReceiver, ConnectError> {
        self.state
            .transition(ConnectionState::Idle, ConnectionState::Connecting)
            .map_err(|state| ConnectError::AlreadyConnected { state })?;

        let Some(outbound_rx) = self.outbound_rx.take() else {
            return Err(ConnectError::AlreadyConnected { state: self.state() });
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let endpoint = self.endpoint.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(run_transport(endpoint, state, events_tx, outbound_rx));

        Ok(events_rx)
    }

    /// Serialize `envelope` and transmit it as one text frame.
    ///
    /// Rejected, not queued, unless the connection is open. Safe to call
    /// synchronously from code handling [`SessionEvent::Opened`].
    pub fn send(&self, envelope: &ClientEnvelope) -> Result<(), SendError> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(SendError::NotOpen { state });
        }

        let text = serde_json::to_string(envelope)?;
        self.outbound_tx
            .send(OutboundFrame::Envelope(text))
            .map_err(|_| SendError::ConnectionGone)
    }

    /// Initiate graceful shutdown. Idempotent and safe in any state,
    /// including a connection that never opened.
    pub fn close(&self) {
        // Never connected: park the state machine in a terminal state so a
        // later connect() refuses.
        let _ = self
            .state
            .transition(ConnectionState::Idle, ConnectionState::Closed);
        let _ = self.outbound_tx.send(OutboundFrame::Close);
    }
}

/// Transport task: owns the socket, drains the outbound queue, forwards
/// inbound frames as events, and parks the state on termination.
async fn run_transport(
    endpoint: String,
    state: Arc<StateCell>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    let ws = match connect_async(&endpoint).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            error!(endpoint = %endpoint, error = %e, "Failed to establish connection");
            state.store(ConnectionState::Failed);
            let _ = events_tx.send(SessionEvent::Failed(SessionError::Connect(
                ConnectError::Establish {
                    endpoint,
                    source: e,
                },
            )));
            return;
        }
    };

    info!(endpoint = %endpoint, "Connection open");
    state.store(ConnectionState::Open);
    let _ = events_tx.send(SessionEvent::Opened);

    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(OutboundFrame::Envelope(text)) => {
                    if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                        error!(endpoint = %endpoint, error = %e, "Failed to send frame");
                        state.store(ConnectionState::Failed);
                        let _ = events_tx.send(SessionEvent::Failed(TransportError(e).into()));
                        return;
                    }
                }
                // Explicit close, or the Connection was dropped.
                Some(OutboundFrame::Close) | None => {
                    debug!(endpoint = %endpoint, "Closing connection");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    let reason = drain_until_closed(&mut ws_rx).await;
                    finish_closed(&endpoint, &state, &events_tx, reason);
                    return;
                }
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = events_tx.send(SessionEvent::Message(Payload::Text(text.to_string())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let _ = events_tx.send(SessionEvent::Message(Payload::Binary(bytes.to_vec())));
                }
                // Transport keep-alive, not session traffic.
                Some(Ok(Message::Ping(_)) | Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    finish_closed(&endpoint, &state, &events_tx, frame.map(close_reason));
                    return;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    error!(endpoint = %endpoint, error = %e, "Transport failure");
                    state.store(ConnectionState::Failed);
                    let _ = events_tx.send(SessionEvent::Failed(TransportError(e).into()));
                    return;
                }
                None => {
                    finish_closed(&endpoint, &state, &events_tx, None);
                    return;
                }
            }
        }
    }
}

/// After a locally initiated close, wait for the peer's close frame (or the
/// end of the stream) without forwarding any further traffic.
async fn drain_until_closed<S>(ws_rx: &mut S) -> Option<CloseReason>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Close(frame)) => return frame.map(close_reason),
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "Transport error while closing");
                return None;
            }
        }
    }
    None
}

fn finish_closed(
    endpoint: &str,
    state: &StateCell,
    events_tx: &mpsc::UnboundedSender<SessionEvent>,
    reason: Option<CloseReason>,
) {
    info!(endpoint = %endpoint, reason = ?reason, "Connection closed");
    state.store(ConnectionState::Closed);
    let _ = events_tx.send(SessionEvent::Closed(reason));
}

fn close_reason(frame: tokio_tungstenite::tungstenite::protocol::CloseFrame) -> CloseReason {
    CloseReason {
        code: frame.code.into(),
        reason: frame.reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::protocol::Credential;

    fn auth_envelope() -> ClientEnvelope {
        ClientEnvelope::AuthRequest(Credential {
            name: "test".into(),
            token: "t".into(),
        })
    }

    #[test]
    fn test_new_connection_is_idle() {
        let conn = Connection::new("ws://localhost:1/ws");
        assert_eq!(conn.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_send_before_connect_is_rejected() {
        let conn = Connection::new("ws://localhost:1/ws");
        let err = conn.send(&auth_envelope()).unwrap_err();
        assert!(matches!(
            err,
            SendError::NotOpen {
                state: ConnectionState::Idle
            }
        ));
    }

    #[test]
    fn test_close_before_connect_is_terminal() {
        let conn = Connection::new("ws://localhost:1/ws");
        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_after_close_is_a_state_conflict() {
        let mut conn = Connection::new("ws://localhost:1/ws");
        conn.close();
        let err = conn.connect().unwrap_err();
        assert!(matches!(
            err,
            ConnectError::AlreadyConnected {
                state: ConnectionState::Closed
            }
        ));
    }

    #[tokio::test]
    async fn test_connect_twice_is_a_state_conflict() {
        let mut conn = Connection::new("ws://localhost:1/ws");
        let _events = conn.connect().unwrap();
        let err = conn.connect().unwrap_err();
        assert!(matches!(err, ConnectError::AlreadyConnected { .. }));
    }

    #[test]
    fn test_state_cell_transitions() {
        let cell = StateCell::new();
        assert_eq!(cell.load(), ConnectionState::Idle);
        assert!(cell
            .transition(ConnectionState::Idle, ConnectionState::Connecting)
            .is_ok());
        assert_eq!(
            cell.transition(ConnectionState::Idle, ConnectionState::Connecting),
            Err(ConnectionState::Connecting)
        );
        cell.store(ConnectionState::Failed);
        assert!(cell.load().is_terminal());
    }
}
