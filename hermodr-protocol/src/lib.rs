//! # hermodr-protocol
//!
//! Wire protocol implementation for hermodr.
//!
//! This crate provides:
//! - Host-independent big-endian codec for fixed-width primitives
//! - Composite encodings for game values (entity ids, vectors, quaternions)
//! - Length-prefixed payload strings and lists
//! - The 12-byte frame header and incremental frame decoding
//! - Operation codes

pub mod codec;
pub mod error;
pub mod frame;
pub mod op;
pub mod payload;
pub mod types;

pub use codec::{get_be, put_be, BigEndian};
pub use error::{CodecError, FrameSection, PayloadError, ProtocolError};
pub use frame::{Frame, FrameDecoder, FrameHeader, FRAME_HEADER_SIZE};
pub use op::{Op, ERROR_OP};
pub use payload::{PayloadReader, PayloadWriter};
pub use types::{EntityId, NetworkStats, Quat, Vec2i, Vec3};

/// Default port for the gateway.
pub const DEFAULT_PORT: u16 = 2458;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
