//! Session driver — wires the handshake and the message sink to a connection.

use tracing::warn;

use tether_core::protocol::Credential;
use tether_core::types::CloseReason;

use crate::connection::{Connection, EventReceiver, SessionEvent};
use crate::error::SessionError;
use crate::handshake;
use crate::sink::MessageSink;

/// How the session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Graceful close from either side.
    Closed(Option<CloseReason>),
    /// Connection establishment or mid-session transport failure.
    Failed(SessionError),
}

/// Drive one session to its terminal state.
///
/// Consumes the event stream: sends the auth request when the connection
/// opens, delivers each inbound payload to `sink`, and returns on the
/// terminal event. Sink failures are logged and skipped — the sink is a
/// collaborator, and a bad frame must not tear down the transport.
pub async fn run_session(
    conn: &Connection,
    mut events: EventReceiver,
    credential: &Credential,
    sink: &dyn MessageSink,
) -> SessionOutcome {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Opened => {
                if let Err(e) = handshake::send_auth_request(conn, credential) {
                    // The transport is on its way down; its terminal event
                    // carries the real failure.
                    warn!(error = %e, "Auth request was not sent");
                }
            }
            SessionEvent::Message(payload) => {
                if let Err(e) = sink.deliver(payload).await {
                    warn!(error = %e, "Message sink rejected a payload");
                }
            }
            SessionEvent::Closed(reason) => return SessionOutcome::Closed(reason),
            SessionEvent::Failed(error) => return SessionOutcome::Failed(error),
        }
    }

    // Event channel ended without a terminal event: the connection was
    // torn down out from under us.
    SessionOutcome::Closed(None)
}
