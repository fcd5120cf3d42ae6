//! RPC request and response messages.
//!
//! Both are plain serde structs, so they travel as ordinary registered
//! payloads inside wire frames.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// A call to a named method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Correlates the response with this request.
    pub seq: u64,
    /// Registered method name.
    pub method: String,
    /// Whether the caller waits for a response.
    pub need_resp: bool,
    /// Opaque argument, interpreted by the handler.
    pub arg: ByteBuf,
}

impl RpcRequest {
    /// Request that expects a response.
    pub fn call(seq: u64, method: impl Into<String>, arg: impl Into<Vec<u8>>) -> Self {
        Self {
            seq,
            method: method.into(),
            need_resp: true,
            arg: ByteBuf::from(arg.into()),
        }
    }

    /// Fire-and-forget request.
    pub fn notify(seq: u64, method: impl Into<String>, arg: impl Into<Vec<u8>>) -> Self {
        Self {
            need_resp: false,
            ..Self::call(seq, method, arg)
        }
    }
}

/// The answer to a request: a result or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Sequence number of the request being answered.
    pub seq: u64,
    /// Opaque result or error description.
    pub result: Result<ByteBuf, String>,
}

impl RpcResponse {
    /// Successful response.
    pub fn ok(seq: u64, ret: impl Into<Vec<u8>>) -> Self {
        Self {
            seq,
            result: Ok(ByteBuf::from(ret.into())),
        }
    }

    /// Error response.
    pub fn err(seq: u64, message: impl Into<String>) -> Self {
        Self {
            seq,
            result: Err(message.into()),
        }
    }

    /// Check if this response carries an error.
    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }
}

impl Default for RpcResponse {
    fn default() -> Self {
        Self::ok(0, Vec::new())
    }
}

/// Either kind of RPC message, as seen by a peer that handles both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcMessage {
    Request(RpcRequest),
    Response(RpcResponse),
}

impl RpcMessage {
    /// Sequence number of the wrapped message.
    pub fn seq(&self) -> u64 {
        match self {
            RpcMessage::Request(req) => req.seq,
            RpcMessage::Response(resp) => resp.seq,
        }
    }
}
