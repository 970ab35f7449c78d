//! Client-side session over a persistent WebSocket connection.
//!
//! A session is linear: [`Connection::connect`] establishes the transport,
//! the auth handshake fires once on open, then inbound frames flow to a
//! [`MessageSink`] until the peer closes or the transport fails. There is
//! no reconnection, no multiplexing, and no auth acknowledgement — retry
//! policy belongs to whoever owns the session.

pub mod connection;
pub mod error;
pub mod handshake;
pub mod session;
pub mod sink;

pub use connection::{Connection, EventReceiver, SessionEvent};
pub use error::{ConnectError, SendError, SessionError, TransportError};
pub use session::{run_session, SessionOutcome};
pub use sink::MessageSink;
