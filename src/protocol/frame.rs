//! Frame encoding and decoding.
//!
//! [`encode_frame`] turns a registered payload into one length-prefixed,
//! type-tagged frame. [`decode_frame`] carves at most one frame out of a
//! byte range and has three outcomes:
//!
//! - `Ok(Some(frame))` - a complete frame was decoded
//! - `Ok(None)` - not enough bytes yet, nothing consumed
//! - `Err(...)` - the stream is corrupt or the type is unknown
//!
//! # Example
//!
//! ```
//! use bytewire::protocol::{decode_frame, encode_frame, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! registry.register::<String>().unwrap();
//!
//! let frame = encode_frame(&registry, &"hi".to_string(), 1024).unwrap().into_bytes();
//! let decoded = decode_frame(&registry, &frame, 0, frame.len(), 1024)
//!     .unwrap()
//!     .expect("complete frame");
//!
//! assert_eq!(decoded.consumed, frame.len());
//! assert_eq!(decoded.message.downcast_ref::<String>().unwrap(), "hi");
//! ```

use std::sync::Arc;

use bytes::Bytes;

use super::registry::TypeRegistry;
use super::wire_format::{
    validate_payload_length, CodecConfig, FrameHeader, HEADER_SIZE, TYPE_ID_SIZE,
};
use crate::buffer::ByteBuffer;
use crate::codec::Payload;
use crate::error::{Result, WireError};

/// A complete frame carved out of a byte range.
#[derive(Debug)]
pub struct DecodedFrame {
    /// Decoded body.
    pub message: Box<dyn Payload>,
    /// Bytes used from the range (length prefix + payload).
    pub consumed: usize,
}

/// Encode `payload` as a frame.
///
/// # Errors
///
/// - `UnregisteredType` if the payload's type is not in `registry`
/// - `MessageTooLarge` if the serialized body exceeds `max_message_size`
/// - serializer errors
pub fn encode_frame(
    registry: &TypeRegistry,
    payload: &dyn Payload,
    max_message_size: usize,
) -> Result<ByteBuffer> {
    let name = payload.type_name();
    let type_id = registry
        .id_of(name)
        .ok_or_else(|| WireError::UnregisteredType(name.to_string()))?;

    let body = payload.marshal()?;
    if body.len() > max_message_size {
        return Err(WireError::MessageTooLarge {
            size: body.len(),
            max: max_message_size,
        });
    }

    let header = FrameHeader::for_body(type_id, body.len())?;
    let mut buf = ByteBuffer::allocate(header.frame_len());
    header.write_to(&mut buf)?;
    buf.append_bytes(&body)?;
    Ok(buf)
}

/// Decode at most one frame from `buf[start..end]`.
///
/// # Errors
///
/// - `InvalidArgument` if `start..end` is not a range inside `buf`
/// - `MessageTooLarge` if the declared payload exceeds `max_message_size`
/// - `MalformedFrame` if the declared payload is zero (or shorter than a type id)
/// - `UnknownType` if the type id is not registered
/// - deserializer errors
pub fn decode_frame(
    registry: &TypeRegistry,
    buf: &Bytes,
    start: usize,
    end: usize,
    max_message_size: usize,
) -> Result<Option<DecodedFrame>> {
    if start > end || end > buf.len() {
        return Err(WireError::InvalidArgument {
            offset: start,
            size: end.saturating_sub(start),
            len: buf.len(),
        });
    }

    let available = end - start;
    if available < HEADER_SIZE {
        return Ok(None);
    }

    let reader = ByteBuffer::wrap(buf.slice(start..end), available)?;
    let payload_length = reader.get_u32(0)?;
    validate_payload_length(payload_length, max_message_size)?;

    let header = FrameHeader {
        payload_length,
        type_id: 0,
    };
    if header.frame_len() > available {
        return Ok(None);
    }

    let type_id = reader.get_u32(HEADER_SIZE)?;
    let mut message = registry.new_message(type_id)?;
    let body = reader.get(HEADER_SIZE + TYPE_ID_SIZE, header.body_len())?;
    message.unmarshal(body)?;

    Ok(Some(DecodedFrame {
        message,
        consumed: header.frame_len(),
    }))
}

/// Frame encoder/decoder bound to a registry and limits.
#[derive(Clone)]
pub struct FrameCodec {
    registry: Arc<TypeRegistry>,
    config: CodecConfig,
}

impl FrameCodec {
    /// Create a codec over `registry`.
    pub fn new(registry: Arc<TypeRegistry>, config: CodecConfig) -> Self {
        Self { registry, config }
    }

    /// The registry this codec resolves types with.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Framing limits.
    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// See [`encode_frame`].
    pub fn encode(&self, payload: &dyn Payload) -> Result<ByteBuffer> {
        encode_frame(&self.registry, payload, self.config.max_message_size)
    }

    /// See [`decode_frame`].
    pub fn decode(&self, buf: &Bytes, start: usize, end: usize) -> Result<Option<DecodedFrame>> {
        decode_frame(&self.registry, buf, start, end, self.config.max_message_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    /// Three raw bytes as a body.
    #[derive(Debug, Default, PartialEq)]
    struct Ping([u8; 3]);

    impl Payload for Ping {
        fn type_name(&self) -> &'static str {
            "Ping"
        }

        fn marshal(&self) -> Result<Vec<u8>> {
            Ok(self.0.to_vec())
        }

        fn unmarshal(&mut self, bytes: &[u8]) -> Result<()> {
            if bytes.len() != 3 {
                return Err(WireError::MalformedFrame("ping body must be 3 bytes"));
            }
            self.0.copy_from_slice(bytes);
            Ok(())
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn std::any::Any + Send> {
            self
        }
    }

    /// Raw bytes as a body.
    #[derive(Debug, Default, PartialEq)]
    struct Blob(Vec<u8>);

    impl Payload for Blob {
        fn type_name(&self) -> &'static str {
            "Blob"
        }

        fn marshal(&self) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }

        fn unmarshal(&mut self, bytes: &[u8]) -> Result<()> {
            self.0 = bytes.to_vec();
            Ok(())
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn std::any::Any + Send> {
            self
        }
    }

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    struct Chat {
        from: String,
        text: String,
    }

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register::<Ping>().unwrap();
        registry.register::<Chat>().unwrap();
        registry.register::<Blob>().unwrap();
        registry
    }

    #[test]
    fn test_ping_frame_layout() {
        let registry = registry();
        let frame = encode_frame(&registry, &Ping([0xAA, 0xBB, 0xCC]), 1024).unwrap();

        assert_eq!(
            frame.as_slice(),
            &[0, 0, 0, 7, 0, 0, 0, 1, 0xAA, 0xBB, 0xCC]
        );

        let bytes = frame.into_bytes();
        let decoded = decode_frame(&registry, &bytes, 0, bytes.len(), 1024)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.consumed, 11);
        assert_eq!(
            decoded.message.downcast_ref::<Ping>(),
            Some(&Ping([0xAA, 0xBB, 0xCC]))
        );
    }

    #[test]
    fn test_serde_payload_roundtrip() {
        let registry = registry();
        let chat = Chat {
            from: "ana".to_string(),
            text: "hello".to_string(),
        };

        let bytes = encode_frame(&registry, &chat, 1024).unwrap().into_bytes();
        let decoded = decode_frame(&registry, &bytes, 0, bytes.len(), 1024)
            .unwrap()
            .unwrap();

        assert_eq!(decoded.consumed, bytes.len());
        assert_eq!(decoded.message.downcast::<Chat>().map(|c| *c), Some(chat));
    }

    #[test]
    fn test_encode_unregistered_type() {
        let registry = registry();
        let result = encode_frame(&registry, &42u64, 1024);
        assert!(matches!(result, Err(WireError::UnregisteredType(_))));
    }

    #[test]
    fn test_encode_body_too_large() {
        let registry = registry();
        let result = encode_frame(&registry, &Ping([1, 2, 3]), 2);
        assert!(matches!(
            result,
            Err(WireError::MessageTooLarge { size: 3, max: 2 })
        ));

        // The limit applies to the body alone.
        assert!(encode_frame(&registry, &Ping([1, 2, 3]), 3).is_ok());
    }

    #[test]
    fn test_limit_counts_type_id_on_decode() {
        let registry = registry();
        let max = 1024;

        // Largest body that survives a round trip under one config.
        let fits = encode_frame(&registry, &Blob(vec![1; max - TYPE_ID_SIZE]), max)
            .unwrap()
            .into_bytes();
        let decoded = decode_frame(&registry, &fits, 0, fits.len(), max)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.message.downcast_ref::<Blob>().unwrap().0.len(), max - 4);

        // A body within four bytes of the limit encodes but cannot be decoded.
        let over = encode_frame(&registry, &Blob(vec![1; max - 3]), max)
            .unwrap()
            .into_bytes();
        let result = decode_frame(&registry, &over, 0, over.len(), max);
        assert!(matches!(
            result,
            Err(WireError::MessageTooLarge { size: 1025, max: 1024 })
        ));
    }

    #[test]
    fn test_decode_needs_header() {
        let registry = registry();
        let bytes = Bytes::from_static(&[0, 0, 0]);
        assert!(decode_frame(&registry, &bytes, 0, 3, 1024).unwrap().is_none());
        assert!(decode_frame(&registry, &bytes, 0, 0, 1024).unwrap().is_none());
    }

    #[test]
    fn test_decode_partial_then_complete() {
        let registry = registry();
        let frame = encode_frame(&registry, &Ping([1, 2, 3]), 1024)
            .unwrap()
            .into_bytes();

        for cut in 0..frame.len() {
            let partial = frame.slice(..cut);
            assert!(decode_frame(&registry, &partial, 0, cut, 1024)
                .unwrap()
                .is_none());
        }

        let decoded = decode_frame(&registry, &frame, 0, frame.len(), 1024)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.consumed, frame.len());
    }

    #[test]
    fn test_decode_with_offset() {
        let registry = registry();
        let first = encode_frame(&registry, &Ping([1, 1, 1]), 1024).unwrap();
        let second = encode_frame(&registry, &Ping([2, 2, 2]), 1024).unwrap();

        let mut stream = Vec::new();
        stream.extend_from_slice(b"xx");
        stream.extend_from_slice(first.as_slice());
        stream.extend_from_slice(second.as_slice());
        let stream = Bytes::from(stream);

        let a = decode_frame(&registry, &stream, 2, stream.len(), 1024)
            .unwrap()
            .unwrap();
        let b = decode_frame(&registry, &stream, 2 + a.consumed, stream.len(), 1024)
            .unwrap()
            .unwrap();

        assert_eq!(a.message.downcast_ref::<Ping>(), Some(&Ping([1, 1, 1])));
        assert_eq!(b.message.downcast_ref::<Ping>(), Some(&Ping([2, 2, 2])));
        assert_eq!(2 + a.consumed + b.consumed, stream.len());
    }

    #[test]
    fn test_decode_payload_too_large() {
        let registry = registry();
        let bytes = Bytes::from_static(&[0, 0, 4, 1]);
        let result = decode_frame(&registry, &bytes, 0, 4, 1024);
        assert!(matches!(
            result,
            Err(WireError::MessageTooLarge { size: 1025, max: 1024 })
        ));
    }

    #[test]
    fn test_decode_zero_length_is_malformed() {
        let registry = registry();
        let bytes = Bytes::from_static(&[0, 0, 0, 0, 0, 0, 0, 1]);
        let result = decode_frame(&registry, &bytes, 0, 8, 1024);
        assert!(matches!(result, Err(WireError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_unknown_type() {
        let registry = registry();
        let bytes = Bytes::from_static(&[0, 0, 0, 5, 0, 0, 0, 99, 0]);
        let result = decode_frame(&registry, &bytes, 0, 9, 1024);
        assert!(matches!(result, Err(WireError::UnknownType(99))));
    }

    #[test]
    fn test_decode_bad_range() {
        let registry = registry();
        let bytes = Bytes::from_static(&[0, 0, 0, 5]);
        assert!(matches!(
            decode_frame(&registry, &bytes, 3, 2, 1024),
            Err(WireError::InvalidArgument { .. })
        ));
        assert!(matches!(
            decode_frame(&registry, &bytes, 0, 5, 1024),
            Err(WireError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_frame_codec_uses_config() {
        let codec = FrameCodec::new(
            Arc::new(registry()),
            CodecConfig::with_max_message_size(8),
        );
        let chat = Chat {
            from: "someone".to_string(),
            text: "a long message".to_string(),
        };
        assert!(matches!(
            codec.encode(&chat),
            Err(WireError::MessageTooLarge { .. })
        ));

        let bytes = codec.encode(&Ping([9, 9, 9])).unwrap().into_bytes();
        let decoded = codec.decode(&bytes, 0, bytes.len()).unwrap().unwrap();
        assert!(decoded.message.is::<Ping>());
    }
}
