//! Pluggable RPC message encoding.
//!
//! The server only talks to [`RpcDecoder`] and [`RpcEncoder`].
//! [`FrameRpcCodec`] implements both on top of the frame codec, carrying
//! requests and responses as registered payload types.

use bytes::Bytes;

use super::message::{RpcMessage, RpcRequest, RpcResponse};
use crate::codec::Payload;
use crate::error::{Result, WireError};
use crate::protocol::{FrameCodec, TypeRegistry};

/// Turns an inbound decoded message into a request.
pub trait RpcDecoder: Send + Sync {
    /// Decode a request.
    ///
    /// # Errors
    ///
    /// Anything that is not a well-formed request.
    fn decode(&self, raw: Box<dyn Payload>) -> Result<RpcRequest>;
}

/// Turns a response into bytes for the channel.
pub trait RpcEncoder: Send + Sync {
    /// Encode a response as one outbound frame.
    fn encode(&self, response: &RpcResponse) -> Result<Bytes>;
}

/// Request/response codec over length-prefixed, type-tagged frames.
#[derive(Clone)]
pub struct FrameRpcCodec {
    codec: FrameCodec,
}

impl FrameRpcCodec {
    /// Create a codec, registering the RPC message types if needed.
    pub fn new(codec: FrameCodec) -> Result<Self> {
        ensure_registered::<RpcRequest>(codec.registry())?;
        ensure_registered::<RpcResponse>(codec.registry())?;
        Ok(Self { codec })
    }

    /// The underlying frame codec.
    pub fn frame_codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Encode a request frame (caller side).
    pub fn encode_request(&self, request: &RpcRequest) -> Result<Bytes> {
        Ok(self.codec.encode(request)?.into_bytes())
    }

    /// Classify a decoded payload as request or response.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedMessage` for any other payload type.
    pub fn decode_message(&self, raw: Box<dyn Payload>) -> Result<RpcMessage> {
        let name = raw.type_name();
        match raw.into_any().downcast::<RpcRequest>() {
            Ok(request) => Ok(RpcMessage::Request(*request)),
            Err(other) => other
                .downcast::<RpcResponse>()
                .map(|response| RpcMessage::Response(*response))
                .map_err(|_| WireError::UnexpectedMessage(name.to_string())),
        }
    }
}

impl RpcDecoder for FrameRpcCodec {
    fn decode(&self, raw: Box<dyn Payload>) -> Result<RpcRequest> {
        match self.decode_message(raw)? {
            RpcMessage::Request(request) => Ok(request),
            RpcMessage::Response(response) => Err(WireError::UnexpectedMessage(format!(
                "response seq {} sent to a server",
                response.seq
            ))),
        }
    }
}

impl RpcEncoder for FrameRpcCodec {
    fn encode(&self, response: &RpcResponse) -> Result<Bytes> {
        Ok(self.codec.encode(response)?.into_bytes())
    }
}

fn ensure_registered<T: Payload + Default>(registry: &TypeRegistry) -> Result<()> {
    match registry.register::<T>() {
        Ok(_) | Err(WireError::DuplicateRegistration(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
