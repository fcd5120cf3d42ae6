//! Per-request reply handle.
//!
//! An [`RpcReplyer`] sends at most one response for its request, no matter
//! how many clones of it race to reply. Replies to requests that did not
//! ask for a response are dropped.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use parking_lot::Mutex;
//! use bytewire::protocol::{CodecConfig, FrameCodec, TypeRegistry};
//! use bytewire::rpc::{FrameRpcCodec, RpcChannel, RpcReplyer, RpcRequest};
//!
//! #[derive(Default)]
//! struct Outbox(Mutex<Vec<Bytes>>);
//!
//! impl RpcChannel for Outbox {
//!     fn send_response(&self, frame: Bytes) -> bytewire::Result<()> {
//!         self.0.lock().push(frame);
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "outbox"
//!     }
//! }
//!
//! let codec = FrameCodec::new(Arc::new(TypeRegistry::new()), CodecConfig::default());
//! let rpc = Arc::new(FrameRpcCodec::new(codec)?);
//! let outbox = Arc::new(Outbox::default());
//!
//! let replyer = RpcReplyer::new(rpc, outbox.clone(), &RpcRequest::call(7, "ping", Vec::new()));
//! let late = replyer.clone();
//!
//! assert!(replyer.reply(Ok(Bytes::from_static(b"pong"))));
//! assert!(!late.reply_err("too late"));
//! assert_eq!(outbox.0.lock().len(), 1);
//! # Ok::<(), bytewire::WireError>(())
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use super::channel::RpcChannel;
use super::codec::RpcEncoder;
use super::message::{RpcRequest, RpcResponse};
use crate::codec::MsgPackCodec;

struct Inner {
    encoder: Arc<dyn RpcEncoder>,
    channel: Arc<dyn RpcChannel>,
    seq: u64,
    method: String,
    need_resp: bool,
    fired: AtomicBool,
}

/// Handle for answering one request.
///
/// Cheap to clone; clones share the one-shot gate, so a handler may move a
/// clone into another task and reply from there.
#[derive(Clone)]
pub struct RpcReplyer {
    inner: Arc<Inner>,
}

impl RpcReplyer {
    /// Create a replyer for `request`.
    pub fn new(
        encoder: Arc<dyn RpcEncoder>,
        channel: Arc<dyn RpcChannel>,
        request: &RpcRequest,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                encoder,
                channel,
                seq: request.seq,
                method: request.method.clone(),
                need_resp: request.need_resp,
                fired: AtomicBool::new(false),
            }),
        }
    }

    /// Sequence number of the request.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.inner.seq
    }

    /// Method name of the request.
    #[inline]
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Whether the caller asked for a response.
    #[inline]
    pub fn needs_response(&self) -> bool {
        self.inner.need_resp
    }

    /// Channel the request arrived on.
    #[inline]
    pub fn channel(&self) -> &Arc<dyn RpcChannel> {
        &self.inner.channel
    }

    /// Whether some reply already went through the gate.
    pub fn has_replied(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Reply with a result or an error.
    ///
    /// Returns `true` if this call won the gate and a response was built.
    /// Encode and send failures are logged; the response is then dropped
    /// and the caller sees a timeout.
    pub fn reply(&self, result: std::result::Result<Bytes, String>) -> bool {
        if !self.inner.need_resp {
            return false;
        }
        if self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!(seq = self.inner.seq, "duplicate reply discarded");
            return false;
        }

        let response = match result {
            Ok(ret) => RpcResponse::ok(self.inner.seq, ret.to_vec()),
            Err(message) => RpcResponse::err(self.inner.seq, message),
        };
        self.send(&response);
        true
    }

    /// Reply with a MsgPack-serialized value.
    ///
    /// A value that fails to serialize is answered with an error instead.
    pub fn reply_ok<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        match MsgPackCodec::encode(value) {
            Ok(data) => self.reply(Ok(Bytes::from(data))),
            Err(e) => self.reply(Err(format!("serialize result: {e}"))),
        }
    }

    /// Reply with an error.
    pub fn reply_err(&self, message: impl fmt::Display) -> bool {
        self.reply(Err(message.to_string()))
    }

    fn send(&self, response: &RpcResponse) {
        let channel = &self.inner.channel;
        let frame = match self.inner.encoder.encode(response) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    channel = channel.name(),
                    seq = response.seq,
                    "encode rpc response failed: {}",
                    e
                );
                return;
            }
        };

        if let Err(e) = channel.send_response(frame) {
            tracing::error!(
                channel = channel.name(),
                seq = response.seq,
                "send rpc response failed: {}",
                e
            );
        }
    }
}

impl fmt::Debug for RpcReplyer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcReplyer")
            .field("seq", &self.inner.seq)
            .field("method", &self.inner.method)
            .field("need_resp", &self.inner.need_resp)
            .field("channel", &self.inner.channel.name())
            .field("replied", &self.has_replied())
            .finish()
    }
}
