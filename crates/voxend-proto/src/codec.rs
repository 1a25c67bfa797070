//! Scalar encoding/decoding traits and helpers.
//!
//! Everything on the wire is network byte order (big-endian). Decoding
//! from a short buffer reports an error, never a zero-filled value.

use bytes::{Buf, BufMut};

use crate::error::WireError;

/// Encode a value onto a buffer.
pub trait WireEncode {
    fn wire_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait WireDecode: Sized {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError>;
}

/// Types with a fixed encoded width, so stream readers know how many
/// bytes to pull before decoding.
pub trait FixedWire {
    const WIRE_SIZE: usize;
}

macro_rules! impl_scalar {
    ($ty:ty, $size:expr, $put:ident, $get:ident) => {
        impl WireEncode for $ty {
            fn wire_encode(&self, buf: &mut impl BufMut) {
                buf.$put(*self);
            }
        }

        impl WireDecode for $ty {
            fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
                if buf.remaining() < $size {
                    return Err(WireError::BufferTooShort {
                        needed: $size,
                        remaining: buf.remaining(),
                    });
                }
                Ok(buf.$get())
            }
        }

        impl FixedWire for $ty {
            const WIRE_SIZE: usize = $size;
        }
    };
}

impl_scalar!(u8, 1, put_u8, get_u8);
impl_scalar!(i8, 1, put_i8, get_i8);
impl_scalar!(u16, 2, put_u16, get_u16);
impl_scalar!(i16, 2, put_i16, get_i16);
impl_scalar!(u32, 4, put_u32, get_u32);
impl_scalar!(i32, 4, put_i32, get_i32);
impl_scalar!(u64, 8, put_u64, get_u64);
impl_scalar!(i64, 8, put_i64, get_i64);
impl_scalar!(f32, 4, put_f32, get_f32);
impl_scalar!(f64, 8, put_f64, get_f64);

/// Booleans travel as a single byte; any nonzero byte decodes as true.
impl WireEncode for bool {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(u8::from(*self));
    }
}

impl WireDecode for bool {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(u8::wire_decode(buf)? != 0)
    }
}

impl FixedWire for bool {
    const WIRE_SIZE: usize = 1;
}

/// Write a length-prefixed string (u16 length + UTF-8 bytes).
///
/// Callers must keep strings under 64 KiB; protocol strings (names)
/// are validated far below that before they reach the wire.
impl WireEncode for String {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.as_str().wire_encode(buf);
    }
}

impl WireEncode for &str {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        debug_assert!(self.len() <= u16::MAX as usize);
        buf.put_u16(self.len() as u16);
        buf.put_slice(self.as_bytes());
    }
}

impl WireDecode for String {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        let len = u16::wire_decode(buf)? as usize;
        if buf.remaining() < len {
            return Err(WireError::BufferTooShort {
                needed: len,
                remaining: buf.remaining(),
            });
        }
        let data = buf.copy_to_bytes(len);
        String::from_utf8(data.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }
}

/// Encode a value into a frozen buffer, for queueing on a send channel.
pub fn encode_to_bytes<T: WireEncode>(value: &T) -> bytes::Bytes {
    let mut buf = bytes::BytesMut::new();
    value.wire_encode(&mut buf);
    buf.freeze()
}
