//! Frame buffer for accumulating partial reads.
//!
//! Bytes arrive from the transport with no regard for frame boundaries.
//! [`FrameDecoder`] keeps the unfinished tail in a `BytesMut` and hands back
//! every complete message on each push.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytewire::protocol::{CodecConfig, FrameCodec, FrameDecoder, TypeRegistry};
//!
//! let registry = Arc::new(TypeRegistry::new());
//! registry.register::<String>().unwrap();
//! let codec = FrameCodec::new(registry, CodecConfig::default());
//!
//! let frame = codec.encode(&"hello".to_string()).unwrap();
//! let (head, tail) = frame.as_slice().split_at(5);
//!
//! let mut decoder = FrameDecoder::new(codec);
//! assert!(decoder.push(head).unwrap().is_empty());
//! assert_eq!(decoder.push(tail).unwrap().len(), 1);
//! ```

use bytes::BytesMut;

use super::frame::FrameCodec;
use super::wire_format::{validate_payload_length, HEADER_SIZE};
use crate::codec::Payload;
use crate::error::{Result, WireError};

/// Default initial capacity of the reassembly buffer (64 KB).
const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Stream reassembler on top of [`FrameCodec`].
pub struct FrameDecoder {
    /// Bytes not yet consumed by a complete frame.
    buffer: BytesMut,
    codec: FrameCodec,
}

impl FrameDecoder {
    /// Create a decoder with the default buffer capacity.
    pub fn new(codec: FrameCodec) -> Self {
        Self::with_capacity(codec, DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a decoder with a custom initial buffer capacity.
    pub fn with_capacity(codec: FrameCodec, capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            codec,
        }
    }

    /// Push data into the buffer and decode all complete frames.
    ///
    /// Partial frames stay buffered for the next push. Frames whose type id
    /// is not registered are skipped with a warning.
    ///
    /// If a frame fails after others in the same push decoded cleanly, those
    /// messages are returned and the failing bytes stay buffered; the next
    /// push (even an empty one) reports the error.
    ///
    /// # Errors
    ///
    /// Any other decode error. The stream can no longer be trusted after
    /// one; the caller should drop the connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Box<dyn Payload>>> {
        let mut messages = Vec::new();
        match self.push_into(data, &mut messages) {
            Err(e) if messages.is_empty() => Err(e),
            _ => Ok(messages),
        }
    }

    /// Like [`push`](Self::push), but appends to `out`.
    ///
    /// Messages decoded before an error are already in `out` when the error
    /// is returned.
    pub fn push_into(&mut self, data: &[u8], out: &mut Vec<Box<dyn Payload>>) -> Result<()> {
        self.buffer.extend_from_slice(data);

        if !self.first_frame_complete()? {
            return Ok(());
        }

        let pending = self.buffer.split().freeze();
        let mut start = 0;

        let outcome = loop {
            match self.codec.decode(&pending, start, pending.len()) {
                Ok(Some(frame)) => {
                    start += frame.consumed;
                    out.push(frame.message);
                }
                Ok(None) => break Ok(()),
                Err(WireError::UnknownType(type_id)) => {
                    // The length prefix was validated, so the frame can be stepped over.
                    let skipped = frame_len_at(&pending[start..]);
                    tracing::warn!(type_id, bytes = skipped, "skipping frame of unknown type");
                    start += skipped;
                }
                Err(e) => break Err(e),
            }
        };

        self.buffer.extend_from_slice(&pending[start..]);
        outcome
    }

    /// Peek at the length prefix so a large frame arriving in small pieces
    /// is not re-scanned on every push.
    fn first_frame_complete(&self) -> Result<bool> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(false);
        }
        let payload_length = read_prefix(&self.buffer);
        validate_payload_length(payload_length, self.codec.config().max_message_size)?;
        Ok(self.buffer.len() >= HEADER_SIZE + payload_length as usize)
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any buffered partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

fn read_prefix(buf: &[u8]) -> u32 {
    let mut prefix = [0u8; HEADER_SIZE];
    prefix.copy_from_slice(&buf[..HEADER_SIZE]);
    u32::from_be_bytes(prefix)
}

/// Total length of the complete frame at the head of `buf`.
fn frame_len_at(buf: &[u8]) -> usize {
    HEADER_SIZE + read_prefix(buf) as usize
}
