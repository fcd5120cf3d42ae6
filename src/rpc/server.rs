//! Method registry and request dispatch.
//!
//! The server maps method names to handlers. Each inbound message is
//! decoded, routed by name, and run inside a wrapper that turns a handler
//! panic into an error response instead of tearing down the caller.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use parking_lot::Mutex;
//! use bytewire::codec::MsgPackCodec;
//! use bytewire::protocol::{CodecConfig, FrameCodec, TypeRegistry};
//! use bytewire::rpc::{
//!     typed_handler, FrameRpcCodec, RpcChannel, RpcMessage, RpcReplyer, RpcRequest, RpcServer,
//! };
//!
//! /// Keeps sent frames in memory.
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
//! let rpc = FrameRpcCodec::new(codec)?;
//! let server = RpcServer::new(Arc::new(rpc.clone()), Arc::new(rpc.clone()));
//! server.register_method("add", typed_handler(|r: RpcReplyer, (a, b): (i64, i64)| {
//!     r.reply_ok(&(a + b));
//! }))?;
//!
//! let outbox = Arc::new(Outbox::default());
//! let channel: Arc<dyn RpcChannel> = outbox.clone();
//! let arg = MsgPackCodec::encode(&(2i64, 40i64))?;
//! server.on_rpc_message(&channel, Box::new(RpcRequest::call(1, "add", arg)));
//!
//! let frame = outbox.0.lock().pop().unwrap();
//! let decoded = rpc.frame_codec().decode(&frame, 0, frame.len())?.unwrap();
//! let RpcMessage::Response(response) = rpc.decode_message(decoded.message)? else {
//!     panic!("expected a response");
//! };
//! assert_eq!(response.seq, 1);
//! let sum: i64 = MsgPackCodec::decode(&response.result.unwrap())?;
//! assert_eq!(sum, 42);
//! # Ok::<(), bytewire::WireError>(())
//! ```

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use super::channel::RpcChannel;
use super::codec::{RpcDecoder, RpcEncoder};
use super::replyer::RpcReplyer;
use crate::codec::{MsgPackCodec, Payload};
use crate::error::{Result, WireError};

/// A registered method.
///
/// The handler owns the reply: it may answer inline, or move the replyer
/// elsewhere and answer later. Returning without replying leaves the caller
/// to time out.
pub trait MethodHandler: Send + Sync + 'static {
    /// Handle one request with its raw argument bytes.
    fn call(&self, replyer: RpcReplyer, arg: Bytes);
}

impl<F> MethodHandler for F
where
    F: Fn(RpcReplyer, Bytes) + Send + Sync + 'static,
{
    fn call(&self, replyer: RpcReplyer, arg: Bytes) {
        self(replyer, arg)
    }
}

/// Wrapper that MsgPack-decodes the argument before calling the handler.
pub struct TypedHandler<F, T>
where
    F: Fn(RpcReplyer, T) + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> TypedHandler<F, T>
where
    F: Fn(RpcReplyer, T) + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T> MethodHandler for TypedHandler<F, T>
where
    F: Fn(RpcReplyer, T) + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    fn call(&self, replyer: RpcReplyer, arg: Bytes) {
        match MsgPackCodec::decode::<T>(&arg) {
            Ok(parsed) => (self.handler)(replyer, parsed),
            Err(e) => {
                tracing::debug!(method = replyer.method(), "bad argument: {}", e);
                replyer.reply_err(format!("invalid argument: {e}"));
            }
        }
    }
}

/// Shorthand for [`TypedHandler::new`].
pub fn typed_handler<F, T>(handler: F) -> TypedHandler<F, T>
where
    F: Fn(RpcReplyer, T) + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
{
    TypedHandler::new(handler)
}

/// Stack recorded by the panic hook while a handler runs.
struct PanicTrace {
    location: Option<String>,
    backtrace: Backtrace,
}

thread_local! {
    static PROTECTED_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicTrace>> = const { RefCell::new(None) };
}

/// Chain a panic hook that records the panicking stack inside protected
/// calls. Installed once per process; the previous hook still runs.
fn install_panic_hook() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let protected = PROTECTED_DEPTH.try_with(Cell::get).unwrap_or(0) > 0;
            if protected {
                let trace = PanicTrace {
                    location: info.location().map(ToString::to_string),
                    backtrace: Backtrace::force_capture(),
                };
                let _ = LAST_PANIC.try_with(|slot| *slot.borrow_mut() = Some(trace));
            }
            previous(info);
        }));
    });
}

/// A panic caught at the dispatch boundary.
struct HandlerFault {
    message: String,
    location: Option<String>,
    backtrace: Backtrace,
}

impl HandlerFault {
    fn new(payload: Box<dyn Any + Send>, trace: Option<PanicTrace>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        // Without the hook's record the best we have is the catch site.
        let trace = trace.unwrap_or_else(|| PanicTrace {
            location: None,
            backtrace: Backtrace::force_capture(),
        });
        Self {
            message,
            location: trace.location,
            backtrace: trace.backtrace,
        }
    }
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        write!(f, "\n{}", self.backtrace)
    }
}

/// Dispatches decoded requests to registered methods.
pub struct RpcServer {
    decoder: Arc<dyn RpcDecoder>,
    encoder: Arc<dyn RpcEncoder>,
    methods: Mutex<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl RpcServer {
    /// Create a server with the given message decoder and response encoder.
    pub fn new(decoder: Arc<dyn RpcDecoder>, encoder: Arc<dyn RpcEncoder>) -> Self {
        install_panic_hook();
        Self {
            decoder,
            encoder,
            methods: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `name` to `handler`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateMethod` if the name is already bound.
    pub fn register_method<H: MethodHandler>(&self, name: &str, handler: H) -> Result<()> {
        assert!(!name.is_empty(), "rpc method name must not be empty");

        let mut methods = self.methods.lock();
        if methods.contains_key(name) {
            return Err(WireError::DuplicateMethod(name.to_string()));
        }
        methods.insert(name.to_string(), Arc::new(handler));
        tracing::debug!(method = name, "rpc method registered");
        Ok(())
    }

    /// Remove a method. Removing an unknown name is a no-op.
    pub fn unregister_method(&self, name: &str) {
        if self.methods.lock().remove(name).is_some() {
            tracing::debug!(method = name, "rpc method unregistered");
        }
    }

    /// Check if a method is bound.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.lock().contains_key(name)
    }

    /// Number of bound methods.
    pub fn method_count(&self) -> usize {
        self.methods.lock().len()
    }

    /// Handle one inbound message from `channel`.
    ///
    /// Never panics on behalf of a handler and never returns an error:
    /// every failure is either answered with an error response or logged.
    pub fn on_rpc_message(&self, channel: &Arc<dyn RpcChannel>, raw: Box<dyn Payload>) {
        let request = match self.decoder.decode(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(channel = channel.name(), "decode rpc request failed: {}", e);
                return;
            }
        };

        let replyer = RpcReplyer::new(self.encoder.clone(), channel.clone(), &request);

        // Lock only for the lookup; the handler may touch the registry.
        let handler = self.methods.lock().get(&request.method).cloned();
        let Some(handler) = handler else {
            tracing::warn!(
                channel = channel.name(),
                seq = request.seq,
                method = %request.method,
                "rpc method not found"
            );
            replyer.reply_err(format!("invalid method: {}", request.method));
            return;
        };

        let arg = Bytes::from(request.arg.into_vec());
        if let Err(fault) = protected_call(handler.as_ref(), replyer.clone(), arg) {
            tracing::error!(
                channel = channel.name(),
                seq = replyer.seq(),
                method = replyer.method(),
                "rpc handler panicked: {}",
                fault
            );
            replyer.reply_err(fault);
        }
    }
}

impl fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcServer")
            .field("methods", &self.method_count())
            .finish()
    }
}

fn protected_call(
    handler: &dyn MethodHandler,
    replyer: RpcReplyer,
    arg: Bytes,
) -> std::result::Result<(), HandlerFault> {
    let _ = LAST_PANIC.try_with(|slot| slot.borrow_mut().take());
    PROTECTED_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.call(replyer, arg)));
    PROTECTED_DEPTH.with(|depth| depth.set(depth.get() - 1));

    outcome.map_err(|payload| {
        let trace = LAST_PANIC
            .try_with(|slot| slot.borrow_mut().take())
            .ok()
            .flatten();
        HandlerFault::new(payload, trace)
    })
}
