//! Wire format constants and frame header.
//!
//! ```text
//! ┌────────────────┬──────────┬──────────────────────┐
//! │ Payload length │ Type ID  │ Body                 │
//! │ 4 bytes        │ 4 bytes  │ payload length - 4   │
//! │ uint32 BE      │ uint32 BE│                      │
//! └────────────────┴──────────┴──────────────────────┘
//! ```
//!
//! The payload length counts everything after itself (type id + body).

use crate::buffer::ByteBuffer;
use crate::error::{Result, WireError};

/// Size of the length prefix.
pub const HEADER_SIZE: usize = 4;

/// Size of the type id that follows the length prefix.
pub const TYPE_ID_SIZE: usize = 4;

/// Default maximum message size (64 KB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Framing limits shared by encoder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Largest body (encode) or payload length (decode) accepted.
    ///
    /// The two checks differ by the 4-byte type id: the encoder compares the
    /// serialized body, the decoder compares `4 + body`. A frame with a body
    /// larger than `max_message_size - 4` is encoded, but a decoder with the
    /// same limit rejects it with `MessageTooLarge`. Keep bodies at or below
    /// `max_message_size - TYPE_ID_SIZE` when both peers share a config.
    pub max_message_size: usize,
}

impl CodecConfig {
    /// Config with a custom maximum message size.
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Bytes following the length prefix (type id + body).
    pub payload_length: u32,
    /// Registered type id of the body.
    pub type_id: u32,
}

impl FrameHeader {
    /// Header for a body of `body_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `MaxSizeExceeded` if the payload length does not fit in 32 bits.
    pub fn for_body(type_id: u32, body_len: usize) -> Result<Self> {
        let payload_length = body_len
            .checked_add(TYPE_ID_SIZE)
            .and_then(|len| u32::try_from(len).ok())
            .ok_or(WireError::MaxSizeExceeded {
                required: body_len as u64 + TYPE_ID_SIZE as u64,
            })?;
        Ok(Self {
            payload_length,
            type_id,
        })
    }

    /// Total frame size including the length prefix.
    #[inline]
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_length as usize
    }

    /// Body size (payload length minus the type id).
    #[inline]
    pub fn body_len(&self) -> usize {
        (self.payload_length as usize).saturating_sub(TYPE_ID_SIZE)
    }

    /// Append the length prefix and type id to `buf`.
    pub fn write_to(&self, buf: &mut ByteBuffer) -> Result<()> {
        buf.append_u32(self.payload_length)?;
        buf.append_u32(self.type_id)
    }
}

/// Check a declared payload length against the configured limit.
///
/// # Errors
///
/// - `MessageTooLarge` if it exceeds `max_message_size`
/// - `MalformedFrame` if it is zero or too short to hold a type id
pub fn validate_payload_length(payload_length: u32, max_message_size: usize) -> Result<()> {
    let size = payload_length as usize;
    if size > max_message_size {
        return Err(WireError::MessageTooLarge {
            size,
            max: max_message_size,
        });
    }
    if size == 0 {
        return Err(WireError::MalformedFrame("payload length is zero"));
    }
    if size < TYPE_ID_SIZE {
        return Err(WireError::MalformedFrame("payload shorter than type id"));
    }
    Ok(())
}
