//! Typed command payloads.
//!
//! Each struct is the body of one command frame; the command id byte
//! itself is written by the session layer. The BLOCK payload is not a
//! struct here: its length-prefixed body is drained field by field so
//! oversized payloads never have to be buffered twice.

use bytes::{Buf, BufMut};

use crate::codec::{FixedWire, WireDecode, WireEncode};
use crate::error::WireError;
use crate::types::{V3F32, V3F64};

/// Entity kind carried by ENTITY_ADD.
pub mod entity_type {
    /// The receiving client's own avatar.
    pub const LOCAL_PLAYER: u32 = 1;
    /// Another player.
    pub const PLAYER: u32 = 2;
}

/// Seed and world parameters, sent once after authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToClientWorldInfo {
    pub seed: u64,
    pub load_distance: u32,
}

/// Current time of day in seconds within the day cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToClientTimeOfDay {
    pub time_of_day: u64,
}

/// Movement tuning pushed to the client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToClientMovement {
    pub flight: bool,
    pub collision: bool,
    pub speed: f32,
    pub gravity: f32,
    pub jump: f32,
}

/// Entity-spawn notice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToClientEntityAdd {
    pub entity_type: u32,
    pub id: u64,
    pub pos: V3F64,
    pub rot: V3F32,
}

/// Authentication request carrying the desired player name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToServerAuth {
    pub name: String,
}

/// Pose update from the gameplay path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToServerMove {
    pub pos: V3F64,
    pub rot: V3F32,
}

impl WireEncode for ToClientWorldInfo {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.seed.wire_encode(buf);
        self.load_distance.wire_encode(buf);
    }
}

impl WireDecode for ToClientWorldInfo {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            seed: u64::wire_decode(buf)?,
            load_distance: u32::wire_decode(buf)?,
        })
    }
}

impl WireEncode for ToClientTimeOfDay {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.time_of_day.wire_encode(buf);
    }
}

impl WireDecode for ToClientTimeOfDay {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            time_of_day: u64::wire_decode(buf)?,
        })
    }
}

impl WireEncode for ToClientMovement {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.flight.wire_encode(buf);
        self.collision.wire_encode(buf);
        self.speed.wire_encode(buf);
        self.gravity.wire_encode(buf);
        self.jump.wire_encode(buf);
    }
}

impl WireDecode for ToClientMovement {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            flight: bool::wire_decode(buf)?,
            collision: bool::wire_decode(buf)?,
            speed: f32::wire_decode(buf)?,
            gravity: f32::wire_decode(buf)?,
            jump: f32::wire_decode(buf)?,
        })
    }
}

impl WireEncode for ToClientEntityAdd {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.entity_type.wire_encode(buf);
        self.id.wire_encode(buf);
        self.pos.wire_encode(buf);
        self.rot.wire_encode(buf);
    }
}

impl WireDecode for ToClientEntityAdd {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            entity_type: u32::wire_decode(buf)?,
            id: u64::wire_decode(buf)?,
            pos: V3F64::wire_decode(buf)?,
            rot: V3F32::wire_decode(buf)?,
        })
    }
}

impl WireEncode for ToServerAuth {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.name.wire_encode(buf);
    }
}

impl WireDecode for ToServerAuth {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            name: String::wire_decode(buf)?,
        })
    }
}

impl WireEncode for ToServerMove {
    fn wire_encode(&self, buf: &mut impl BufMut) {
        self.pos.wire_encode(buf);
        self.rot.wire_encode(buf);
    }
}

impl WireDecode for ToServerMove {
    fn wire_decode(buf: &mut impl Buf) -> Result<Self, WireError> {
        Ok(Self {
            pos: V3F64::wire_decode(buf)?,
            rot: V3F32::wire_decode(buf)?,
        })
    }
}

impl FixedWire for ToClientWorldInfo {
    const WIRE_SIZE: usize = u64::WIRE_SIZE + u32::WIRE_SIZE;
}

impl FixedWire for ToClientTimeOfDay {
    const WIRE_SIZE: usize = u64::WIRE_SIZE;
}

impl FixedWire for ToClientMovement {
    const WIRE_SIZE: usize = 2 * bool::WIRE_SIZE + 3 * f32::WIRE_SIZE;
}

impl FixedWire for ToClientEntityAdd {
    const WIRE_SIZE: usize =
        u32::WIRE_SIZE + u64::WIRE_SIZE + V3F64::WIRE_SIZE + V3F32::WIRE_SIZE;
}

impl FixedWire for ToServerMove {
    const WIRE_SIZE: usize = V3F64::WIRE_SIZE + V3F32::WIRE_SIZE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip<T>(value: T)
    where
        T: WireEncode + WireDecode + PartialEq + std::fmt::Debug,
    {
        let mut buf = BytesMut::new();
        value.wire_encode(&mut buf);
        let decoded = T::wire_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn world_info() {
        roundtrip(ToClientWorldInfo {
            seed: 0x0123_4567_89AB_CDEF,
            load_distance: 3,
        });
    }

    #[test]
    fn movement_tuning() {
        roundtrip(ToClientMovement {
            flight: false,
            collision: true,
            speed: 4.317,
            gravity: 32.0,
            jump: 8.944,
        });
    }

    #[test]
    fn entity_add() {
        roundtrip(ToClientEntityAdd {
            entity_type: entity_type::LOCAL_PLAYER,
            id: 229779,
            pos: V3F64::new(0.0, 32.5, 0.0),
            rot: V3F32::new(0.0, 0.0, 0.0),
        });
    }

    #[test]
    fn auth_request() {
        roundtrip(ToServerAuth {
            name: "alice".into(),
        });
    }

    #[test]
    fn move_update() {
        roundtrip(ToServerMove {
            pos: V3F64::new(1.5, 64.0, -9.25),
            rot: V3F32::new(0.0, 90.0, 0.0),
        });
    }

    #[test]
    fn truncated_message_is_an_error() {
        let mut buf = BytesMut::new();
        ToClientWorldInfo {
            seed: 1,
            load_distance: 2,
        }
        .wire_encode(&mut buf);
        let truncated = buf.freeze().slice(..10);
        assert!(ToClientWorldInfo::wire_decode(&mut truncated.clone()).is_err());
    }
}
