//! Tether client wire protocol.
//!
//! All client communication uses JSON-over-WebSocket. Each frame is one
//! complete serialized envelope; the only outbound shape this client
//! defines is the authentication request. Inbound frames are opaque
//! payloads and are never parsed here.

use serde::{Deserialize, Serialize};

/// Credentials presented to the orchestrator on connect.
///
/// Supplied externally (config, environment, flags) and never validated
/// by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub token: String,
}

/// A client wire frame — the top-level message envelope.
///
/// Externally tagged: `AuthRequest` serializes to
/// `{"AuthRequest":{"name":"...","token":"..."}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientEnvelope {
    /// Client -> Server authentication request, sent once per connection
    /// immediately after the transport opens. Fire-and-forget: no
    /// acknowledgement is awaited.
    AuthRequest(Credential),
}
