//! Session lifecycle types shared between the client and its callers.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single connection.
///
/// `Closed` and `Failed` are terminal: there is no transition out of them,
/// and a new session requires a new connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, `connect` not yet called.
    Idle,
    /// Transport handshake in flight.
    Connecting,
    /// Transport established; frames may be sent and received.
    Open,
    /// Terminated cleanly by either side.
    Closed,
    /// Transport error, either during establishment or mid-session.
    Failed,
}

impl ConnectionState {
    /// Whether the session can never leave this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One inbound frame, forwarded verbatim to the message sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

/// Close detail reported by the peer, when it sent any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}
