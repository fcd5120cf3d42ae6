//! Buffer module - growable byte storage that wire frames are built in.
//!
//! [`ByteBuffer`] tracks a logical length separately from its allocated
//! capacity, grows in powers of two, and can alias caller-owned bytes until
//! the first write (copy-on-write).
//!
//! # Example
//!
//! ```
//! use bytewire::buffer::ByteBuffer;
//!
//! let mut buf = ByteBuffer::allocate(5);
//! buf.put(0, b"0123456789").unwrap();
//! assert_eq!(buf.len(), 10);
//! assert_eq!(buf.capacity(), 16);
//! ```

mod byte_buffer;

pub use byte_buffer::{is_pow2, size_of_pow2, ByteBuffer, DEFAULT_CAPACITY, MAX_BUFFER_SIZE};
