//! Message sink — where inbound payloads are delivered.
//!
//! The sink is a collaborator, not part of the session core: display,
//! routing, and parsing of inbound frames all happen behind this seam.

use async_trait::async_trait;

use tether_core::types::Payload;

/// Receives each inbound payload, in arrival order, verbatim.
#[async_trait]
pub trait MessageSink: Send + Sync + 'static {
    async fn deliver(&self, payload: Payload) -> anyhow::Result<()>;
}
