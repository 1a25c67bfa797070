//! Vector types shared across the protocol.
//!
//! Vectors encode as their scalar components in `x, y[, z]` order with
//! no padding, in the same byte order as bare scalars.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::codec::{FixedWire, WireDecode, WireEncode};
use crate::error::WireError;

/// Two-component vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct V2<T> {
    pub x: T,
    pub y: T,
}

/// Three-component vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct V3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> V2<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T> V3<T> {
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl<T: WireEncode> WireEncode for V2<T> {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.x.wire_encode(buf);
        self.y.wire_encode(buf);
    }
}

impl<T: WireDecode> WireDecode for V2<T> {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            x: T::wire_decode(buf)?,
            y: T::wire_decode(buf)?,
        })
    }
}

impl<T: FixedWire> FixedWire for V2<T> {
    const WIRE_SIZE: usize = 2 * T::WIRE_SIZE;
}

impl<T: WireEncode> WireEncode for V3<T> {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.x.wire_encode(buf);
        self.y.wire_encode(buf);
        self.z.wire_encode(buf);
    }
}

impl<T: WireDecode> WireDecode for V3<T> {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            x: T::wire_decode(buf)?,
            y: T::wire_decode(buf)?,
            z: T::wire_decode(buf)?,
        })
    }
}

impl<T: FixedWire> FixedWire for V3<T> {
    const WIRE_SIZE: usize = 3 * T::WIRE_SIZE;
}

impl<T: fmt::Display> fmt::Display for V2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl<T: fmt::Display> fmt::Display for V3<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

pub type V2S32 = V2<i32>;
pub type V2F32 = V2<f32>;
/// Block coordinate. `Ord` so it can key an ordered index.
pub type V3S32 = V3<i32>;
/// Player rotation (pitch/yaw/roll).
pub type V3F32 = V3<f32>;
/// Player world position.
pub type V3F64 = V3<f64>;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn v3s32_roundtrip() {
        let v = V3S32::new(100, -200, i32::MAX);
        let mut buf = BytesMut::new();
        v.wire_encode(&mut buf);
        assert_eq!(buf.len(), V3S32::WIRE_SIZE);
        assert_eq!(V3S32::wire_decode(&mut buf.freeze()).unwrap(), v);
    }

    #[test]
    fn v3f64_roundtrip() {
        let v = V3F64::new(0.5, -1024.25, f64::MAX);
        let mut buf = BytesMut::new();
        v.wire_encode(&mut buf);
        assert_eq!(buf.len(), 24);
        assert_eq!(V3F64::wire_decode(&mut buf.freeze()).unwrap(), v);
    }

    #[test]
    fn v2s32_roundtrip() {
        let v = V2S32::new(i32::MIN, 7);
        let mut buf = BytesMut::new();
        v.wire_encode(&mut buf);
        assert_eq!(buf.len(), 8);
        assert_eq!(V2S32::wire_decode(&mut buf.freeze()).unwrap(), v);
    }

    #[test]
    fn component_order_on_wire() {
        let v = V3::new(1u8, 2u8, 3u8);
        let mut buf = BytesMut::new();
        v.wire_encode(&mut buf);
        assert_eq!(&buf[..], &[1, 2, 3]);
    }

    #[test]
    fn truncated_vector_is_an_error() {
        let v = V3S32::new(1, 2, 3);
        let mut buf = BytesMut::new();
        v.wire_encode(&mut buf);
        let truncated = buf.freeze().slice(..8);
        assert!(V3S32::wire_decode(&mut truncated.clone()).is_err());
    }

    #[test]
    fn block_pos_ordering() {
        // BTreeMap-keyed block positions rely on lexicographic x, y, z.
        assert!(V3S32::new(0, 0, 0) < V3S32::new(0, 0, 1));
        assert!(V3S32::new(-1, 100, 100) < V3S32::new(0, -100, -100));
    }
}
