//! The transport boundary the RPC layer replies through.

use bytes::Bytes;

use crate::error::Result;

/// A bidirectional connection, seen from the RPC server.
///
/// `send_response` must not block on I/O; a failure is reported, not awaited.
pub trait RpcChannel: Send + Sync {
    /// Queue an encoded response frame for the peer.
    fn send_response(&self, frame: Bytes) -> Result<()>;

    /// Human-readable name for diagnostics.
    fn name(&self) -> &str;
}
