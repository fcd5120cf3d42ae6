//! Codec module - serialization of frame bodies.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`)
//! - [`Payload`] - the type-erased body a wire frame carries
//!
//! # Example
//!
//! ```
//! use bytewire::codec::{MsgPackCodec, Payload};
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//!
//! let body: Box<dyn Payload> = Box::new(decoded);
//! assert_eq!(body.marshal().unwrap(), encoded);
//! ```

mod msgpack;
mod payload;

pub use msgpack::MsgPackCodec;
pub use payload::Payload;
