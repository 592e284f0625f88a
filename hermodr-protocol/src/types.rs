//! Composite game values with fixed big-endian layouts.
//!
//! Each layout is a plain sequence of primitive fields; encoding one of
//! these values is nothing more than the primitive codec applied at
//! consecutive offsets.
//!
//! | type           | layout                                  | bytes |
//! |----------------|-----------------------------------------|-------|
//! | `EntityId`     | `owner: i64`, `local_id: u32`           | 12    |
//! | `Vec3`         | `x, y, z: f32`                          | 12    |
//! | `Vec2i`        | `x, y: i32`                             | 8     |
//! | `Quat`         | `x, y, z, w: f32`                       | 16    |
//! | `NetworkStats` | `f32, f32, i32, f32, f32`               | 20    |

use crate::codec::BigEndian;
use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// 96-bit identifier of a world object: the owning peer plus a per-owner id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EntityId {
    pub owner: i64,
    pub local_id: u32,
}

impl EntityId {
    /// The "no object" id.
    pub const NONE: EntityId = EntityId {
        owner: 0,
        local_id: 0,
    };

    pub fn new(owner: i64, local_id: u32) -> Self {
        Self { owner, local_id }
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl BigEndian for EntityId {
    const WIDTH: usize = 12;

    fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
        self.owner.put_be(buf, offset)?;
        self.local_id.put_be(buf, offset + 8)
    }

    fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError> {
        let owner = i64::get_be(buf, offset)?;
        let local_id = u32::get_be(buf, offset + 8)?;
        Ok(Self { owner, local_id })
    }
}

/// 3D float vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl BigEndian for Vec3 {
    const WIDTH: usize = 12;

    fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
        self.x.put_be(buf, offset)?;
        self.y.put_be(buf, offset + 4)?;
        self.z.put_be(buf, offset + 8)
    }

    fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError> {
        Ok(Self {
            x: f32::get_be(buf, offset)?,
            y: f32::get_be(buf, offset + 4)?,
            z: f32::get_be(buf, offset + 8)?,
        })
    }
}

/// 2D integer vector (zone coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2i {
    pub x: i32,
    pub y: i32,
}

impl Vec2i {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl BigEndian for Vec2i {
    const WIDTH: usize = 8;

    fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
        self.x.put_be(buf, offset)?;
        self.y.put_be(buf, offset + 4)
    }

    fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError> {
        Ok(Self {
            x: i32::get_be(buf, offset)?,
            y: i32::get_be(buf, offset + 4)?,
        })
    }
}

/// Rotation quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BigEndian for Quat {
    const WIDTH: usize = 16;

    fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
        self.x.put_be(buf, offset)?;
        self.y.put_be(buf, offset + 4)?;
        self.z.put_be(buf, offset + 8)?;
        self.w.put_be(buf, offset + 12)
    }

    fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError> {
        Ok(Self {
            x: f32::get_be(buf, offset)?,
            y: f32::get_be(buf, offset + 4)?,
            z: f32::get_be(buf, offset + 8)?,
            w: f32::get_be(buf, offset + 12)?,
        })
    }
}

/// Connection quality figures reported by the game server.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    pub local_quality: f32,
    pub remote_quality: f32,
    pub ping_ms: i32,
    pub out_bytes_per_sec: f32,
    pub in_bytes_per_sec: f32,
}

impl BigEndian for NetworkStats {
    const WIDTH: usize = 20;

    fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
        self.local_quality.put_be(buf, offset)?;
        self.remote_quality.put_be(buf, offset + 4)?;
        self.ping_ms.put_be(buf, offset + 8)?;
        self.out_bytes_per_sec.put_be(buf, offset + 12)?;
        self.in_bytes_per_sec.put_be(buf, offset + 16)
    }

    fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError> {
        Ok(Self {
            local_quality: f32::get_be(buf, offset)?,
            remote_quality: f32::get_be(buf, offset + 4)?,
            ping_ms: i32::get_be(buf, offset + 8)?,
            out_bytes_per_sec: f32::get_be(buf, offset + 12)?,
            in_bytes_per_sec: f32::get_be(buf, offset + 16)?,
        })
    }
}
