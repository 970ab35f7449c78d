use tether_core::types::ConnectionState;
use thiserror::Error;

/// Failure to establish the transport connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// `connect` was already called on this instance; a new session
    /// requires a new [`Connection`](crate::Connection).
    #[error("connect already attempted (state: {state})")]
    AlreadyConnected { state: ConnectionState },

    /// DNS, refused, TLS, or an invalid endpoint URI.
    #[error("failed to connect to `{endpoint}`: {source}")]
    Establish {
        endpoint: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
}

/// Failure to transmit an envelope.
#[derive(Debug, Error)]
pub enum SendError {
    /// Sends are rejected, not queued, while the connection is not open.
    #[error("cannot send while connection is {state}")]
    NotOpen { state: ConnectionState },

    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The transport task exited between the state check and the write.
    #[error("connection is gone")]
    ConnectionGone,
}

/// Mid-session transport failure, surfaced via the event stream.
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(#[from] pub tokio_tungstenite::tungstenite::Error);

/// Any failure that terminates the session, carried by
/// [`SessionEvent::Failed`](crate::SessionEvent::Failed).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
