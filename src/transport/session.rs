//! Read loop feeding a byte stream into the RPC server.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, WireError};
use crate::protocol::FrameDecoder;
use crate::rpc::{RpcChannel, RpcServer};

/// Size of each read from the stream.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Read frames from `reader` and dispatch each one to `server`.
///
/// Responses go out through `channel`. Messages are dispatched in arrival
/// order on the calling task; a handler that wants to overlap work moves
/// its replyer elsewhere.
///
/// Returns `Ok(())` when the peer closes the stream. A framing error ends
/// the loop with that error, since the rest of the stream cannot be
/// trusted. Frames decoded ahead of the bad one are still dispatched, and
/// frames of an unregistered type are skipped. A partial frame left at EOF
/// is dropped with a warning.
pub async fn serve_stream<R>(
    mut reader: R,
    mut decoder: FrameDecoder,
    server: Arc<RpcServer>,
    channel: Arc<dyn RpcChannel>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                if !decoder.is_empty() {
                    tracing::warn!(
                        channel = channel.name(),
                        pending = decoder.len(),
                        "stream closed mid-frame"
                    );
                }
                tracing::debug!(channel = channel.name(), "stream closed");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!(channel = channel.name(), "read error: {}", e);
                return Err(WireError::Io(e));
            }
        };

        let mut messages = Vec::new();
        let outcome = decoder.push_into(&buf[..n], &mut messages);

        for message in messages {
            server.on_rpc_message(&channel, message);
        }

        if let Err(e) = outcome {
            tracing::error!(channel = channel.name(), "framing error: {}", e);
            return Err(e);
        }
    }
}
