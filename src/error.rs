//! Error types for bytewire.

use thiserror::Error;

/// Main error type for buffer, framing and RPC operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// Buffer growth beyond the 32-bit size ceiling.
    #[error("max buffer size exceeded: {required} bytes required")]
    MaxSizeExceeded { required: u64 },

    /// Out-of-range offset or size.
    #[error("invalid argument: offset {offset} size {size} (buffer length {len})")]
    InvalidArgument { offset: usize, size: usize, len: usize },

    /// A payload type was registered twice.
    #[error("type already registered: {0}")]
    DuplicateRegistration(String),

    /// Frame carries a type id nobody registered.
    #[error("unknown type id: {0}")]
    UnknownType(u32),

    /// Encoding a payload whose type was never registered.
    #[error("unregistered type: {0}")]
    UnregisteredType(String),

    /// Payload larger than the configured maximum message size.
    #[error("message size {size} exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Frame header that cannot be trusted (stream is corrupt).
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// A method name is already bound to a handler.
    #[error("duplicate method: {0}")]
    DuplicateMethod(String),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Decoded message is not of the kind the caller expects.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer or writer task went away.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using WireError.
pub type Result<T> = std::result::Result<T, WireError>;
