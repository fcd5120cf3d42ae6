//! # bytewire
//!
//! Buffers, framing and RPC dispatch for binary request/response protocols.
//!
//! ## Architecture
//!
//! - **Buffer**: growable, copy-on-write byte storage frames are built in
//! - **Protocol**: `[u32 length][u32 type id][body]` frames, big-endian,
//!   with a registry mapping type ids to payload types
//! - **RPC**: method registry, panic-safe dispatch, exactly-once replies
//! - **Transport**: writer task and read loop over any tokio byte stream
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//! use bytewire::protocol::{CodecConfig, FrameCodec, FrameDecoder, TypeRegistry};
//! use bytewire::rpc::{FrameRpcCodec, RpcMessage, RpcReplyer, RpcRequest, RpcServer};
//! use bytewire::transport::{serve_stream, spawn_writer_task_default};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> bytewire::Result<()> {
//! let codec = FrameCodec::new(Arc::new(TypeRegistry::new()), CodecConfig::default());
//! let rpc = FrameRpcCodec::new(codec.clone())?;
//! let server = Arc::new(RpcServer::new(Arc::new(rpc.clone()), Arc::new(rpc.clone())));
//! server.register_method("echo", |r: RpcReplyer, arg: Bytes| {
//!     r.reply(Ok(arg));
//! })?;
//!
//! let (mut client, stream) = tokio::io::duplex(4096);
//! client.write_all(&rpc.encode_request(&RpcRequest::call(1, "echo", b"hi".to_vec()))?).await?;
//! client.shutdown().await?;
//!
//! let (read_half, write_half) = tokio::io::split(stream);
//! let (writer, task) = spawn_writer_task_default(write_half);
//! serve_stream(read_half, FrameDecoder::new(codec.clone()), server, Arc::new(writer)).await?;
//! task.await.unwrap()?;
//!
//! let mut out = Vec::new();
//! client.read_to_end(&mut out).await?;
//! let mut messages = FrameDecoder::new(codec).push(&out)?;
//! let RpcMessage::Response(response) = rpc.decode_message(messages.remove(0))? else {
//!     panic!("expected a response");
//! };
//! assert_eq!(response.result.unwrap().as_slice(), b"hi");
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod rpc;
pub mod transport;

pub use buffer::ByteBuffer;
pub use codec::Payload;
pub use error::{Result, WireError};
pub use protocol::{FrameCodec, FrameDecoder, TypeRegistry};
pub use rpc::{RpcChannel, RpcReplyer, RpcServer};
