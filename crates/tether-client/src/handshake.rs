//! One-shot authentication handshake.
//!
//! Fired exactly once when the connection opens. Fire-and-forget: no reply
//! is awaited or parsed, and a peer rejection arrives as an ordinary
//! inbound frame. Success means only that the send did not fail.

use tracing::debug;

use tether_core::protocol::{ClientEnvelope, Credential};

use crate::connection::Connection;
use crate::error::SendError;

/// Build the auth envelope from `credential` and transmit it.
pub fn send_auth_request(conn: &Connection, credential: &Credential) -> Result<(), SendError> {
    let envelope = ClientEnvelope::AuthRequest(credential.clone());
    conn.send(&envelope)?;
    debug!(name = %credential.name, "Sent auth request");
    Ok(())
}
