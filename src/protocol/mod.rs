//! Protocol module - wire format, type registry, and framing.
//!
//! This module implements the data-plane framing:
//! - 4-byte length prefix + 4-byte type id header
//! - Type registry assigning compact ids to payload types
//! - Resumable single-frame decoding and a stream reassembler

mod frame;
mod frame_buffer;
mod registry;
mod wire_format;

pub use frame::{decode_frame, encode_frame, DecodedFrame, FrameCodec};
pub use frame_buffer::FrameDecoder;
pub use registry::TypeRegistry;
pub use wire_format::{
    validate_payload_length, CodecConfig, FrameHeader, DEFAULT_MAX_MESSAGE_SIZE, HEADER_SIZE,
    TYPE_ID_SIZE,
};
