//! Transport module - moving frames over an async byte stream.
//!
//! Connection setup is left to the caller; this module only needs the two
//! halves of an established stream:
//! - [`spawn_writer_task`] owns the write half and implements `RpcChannel`
//! - [`serve_stream`] drives the read half into an `RpcServer`

mod session;
mod writer;

pub use session::serve_stream;
pub use writer::{
    spawn_writer_task, spawn_writer_task_default, WriterConfig, WriterHandle,
    DEFAULT_CHANNEL_CAPACITY,
};
