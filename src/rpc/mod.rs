//! RPC module - method dispatch on top of the wire codec.
//!
//! - [`RpcServer`] - method registry and panic-safe dispatch
//! - [`RpcReplyer`] - exactly-once reply handle per request
//! - [`RpcDecoder`] / [`RpcEncoder`] - pluggable message codecs
//! - [`FrameRpcCodec`] - both codecs over framed wire messages
//! - [`RpcChannel`] - where responses are sent

mod channel;
mod codec;
mod message;
mod replyer;
mod server;

pub use channel::RpcChannel;
pub use codec::{FrameRpcCodec, RpcDecoder, RpcEncoder};
pub use message::{RpcMessage, RpcRequest, RpcResponse};
pub use replyer::RpcReplyer;
pub use server::{typed_handler, MethodHandler, RpcServer, TypedHandler};
