//! Resizable byte buffer with explicit offsets and copy-on-write aliasing.
//!
//! All multi-byte integers are Big Endian.

use bytes::Bytes;

use crate::error::{Result, WireError};

/// Largest capacity a buffer may grow to (u32::MAX).
pub const MAX_BUFFER_SIZE: u64 = 0xFFFF_FFFF;

/// Capacity used by `ByteBuffer::default()`.
pub const DEFAULT_CAPACITY: usize = 128;

/// Check whether `size` is a power of two (0 counts, like the bit trick).
#[inline]
pub fn is_pow2(size: u64) -> bool {
    size & size.wrapping_sub(1) == 0
}

/// Round `size` up to the next power of two; powers of two are returned as-is.
#[inline]
pub fn size_of_pow2(size: u64) -> u64 {
    if is_pow2(size) {
        size
    } else {
        size.next_power_of_two()
    }
}

#[derive(Debug)]
enum Storage {
    /// Private, zero-initialized allocation. `len()` is the capacity.
    Owned(Vec<u8>),
    /// Caller-owned bytes, untouched so far.
    Shared(Bytes),
}

/// Growable byte buffer.
///
/// Writes address the buffer by offset; the logical length only ever grows
/// (until [`reset`](ByteBuffer::reset)). Not internally synchronized.
#[derive(Debug)]
pub struct ByteBuffer {
    storage: Storage,
    len: usize,
}

impl ByteBuffer {
    /// Allocate a private, zeroed buffer of `size` bytes with logical length 0.
    pub fn allocate(size: usize) -> Self {
        Self {
            storage: Storage::Owned(vec![0u8; size]),
            len: 0,
        }
    }

    /// Wrap caller-owned bytes without copying.
    ///
    /// The first write materializes a private copy; `bytes` itself is never
    /// modified.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `len` exceeds the wrapped storage.
    pub fn wrap(bytes: impl Into<Bytes>, len: usize) -> Result<Self> {
        let bytes = bytes.into();
        if len > bytes.len() {
            return Err(WireError::InvalidArgument {
                offset: 0,
                size: len,
                len: bytes.len(),
            });
        }
        Ok(Self {
            storage: Storage::Shared(bytes),
            len,
        })
    }

    /// Logical length (bytes written).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the logical length is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated length.
    #[inline]
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(vec) => vec.len(),
            Storage::Shared(bytes) => bytes.len(),
        }
    }

    /// True while the buffer still aliases the bytes it was wrapped around.
    #[inline]
    pub fn is_copy_on_write(&self) -> bool {
        matches!(self.storage, Storage::Shared(_))
    }

    /// Drop the logical contents, keeping the allocation for reuse.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Logical contents as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.raw()[..self.len]
    }

    /// Convert into `Bytes` holding the logical contents.
    ///
    /// A buffer still in copy-on-write mode hands back a slice of the
    /// original `Bytes` without copying.
    pub fn into_bytes(self) -> Bytes {
        match self.storage {
            Storage::Owned(mut vec) => {
                vec.truncate(self.len);
                Bytes::from(vec)
            }
            Storage::Shared(bytes) => bytes.slice(..self.len),
        }
    }

    /// Write `data` at `offset`, growing as needed.
    ///
    /// Bytes between the old logical end and `offset` read back as zero.
    ///
    /// # Errors
    ///
    /// Returns `MaxSizeExceeded` if the buffer would have to grow past
    /// [`MAX_BUFFER_SIZE`].
    pub fn put(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = self.ensure_capacity(offset, data.len())?;
        if let Storage::Owned(vec) = &mut self.storage {
            vec[offset..end].copy_from_slice(data);
        }
        if end > self.len {
            self.len = end;
        }
        Ok(())
    }

    /// Borrow `size` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the range reaches past the logical length
    /// or `offset + size` overflows.
    pub fn get(&self, offset: usize, size: usize) -> Result<&[u8]> {
        match offset.checked_add(size) {
            Some(end) if end <= self.len => Ok(&self.raw()[offset..end]),
            _ => Err(WireError::InvalidArgument {
                offset,
                size,
                len: self.len,
            }),
        }
    }

    /// Write `data` at the current logical end.
    pub fn append_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.put(self.len, data)
    }

    /// Write a UTF-8 string at `offset`.
    pub fn put_str(&mut self, offset: usize, value: &str) -> Result<()> {
        self.put(offset, value.as_bytes())
    }

    /// Read `size` bytes at `offset` as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for out-of-range reads and invalid UTF-8.
    pub fn get_str(&self, offset: usize, size: usize) -> Result<&str> {
        let raw = self.get(offset, size)?;
        std::str::from_utf8(raw).map_err(|_| WireError::InvalidArgument {
            offset,
            size,
            len: self.len,
        })
    }

    fn raw(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(vec) => vec,
            Storage::Shared(bytes) => bytes,
        }
    }

    /// Make `[offset, offset + size)` writable and private. Returns the end offset.
    fn ensure_capacity(&mut self, offset: usize, size: usize) -> Result<usize> {
        let end = offset
            .checked_add(size)
            .filter(|&end| end as u64 <= MAX_BUFFER_SIZE)
            .ok_or(WireError::MaxSizeExceeded {
                required: (offset as u64).saturating_add(size as u64),
            })?;

        if let Storage::Shared(shared) = &self.storage {
            // Sized to the immediate need, not rounded; never below the data we keep.
            let mut owned = vec![0u8; end.max(self.len)];
            owned[..self.len].copy_from_slice(&shared[..self.len]);
            self.storage = Storage::Owned(owned);
            return Ok(end);
        }

        if end > self.capacity() {
            self.grow(end)?;
        }
        Ok(end)
    }

    fn grow(&mut self, required: usize) -> Result<()> {
        let new_capacity = size_of_pow2(required as u64);
        if new_capacity > MAX_BUFFER_SIZE {
            return Err(WireError::MaxSizeExceeded {
                required: new_capacity,
            });
        }

        let mut grown = vec![0u8; new_capacity as usize];
        grown[..self.len].copy_from_slice(&self.raw()[..self.len]);
        self.storage = Storage::Owned(grown);
        Ok(())
    }
}

macro_rules! int_accessors {
    ($($ty:ty => $put:ident, $get:ident, $append:ident;)*) => {
        impl ByteBuffer {
            $(
                #[doc = concat!("Write a big-endian `", stringify!($ty), "` at `offset`.")]
                pub fn $put(&mut self, offset: usize, value: $ty) -> Result<()> {
                    self.put(offset, &value.to_be_bytes())
                }

                #[doc = concat!("Read a big-endian `", stringify!($ty), "` at `offset`.")]
                pub fn $get(&self, offset: usize) -> Result<$ty> {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(self.get(offset, std::mem::size_of::<$ty>())?);
                    Ok(<$ty>::from_be_bytes(raw))
                }

                #[doc = concat!("Append a big-endian `", stringify!($ty), "` at the logical end.")]
                pub fn $append(&mut self, value: $ty) -> Result<()> {
                    self.$put(self.len, value)
                }
            )*
        }
    };
}

int_accessors! {
    u8 => put_u8, get_u8, append_u8;
    u16 => put_u16, get_u16, append_u16;
    u32 => put_u32, get_u32, append_u32;
    u64 => put_u64, get_u64, append_u64;
}

impl Clone for ByteBuffer {
    /// Deep copy of the whole allocation; the copy never aliases.
    fn clone(&self) -> Self {
        Self {
            storage: Storage::Owned(self.raw().to_vec()),
            len: self.len,
        }
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::allocate(DEFAULT_CAPACITY)
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
