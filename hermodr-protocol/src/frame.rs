//! Binary frame format.
//!
//! Frame layout (12 bytes header + payload):
//!
//! ```text
//! +---------+---------+-------------+-------------------+
//! |   id    |   op    | payload_len | payload           |
//! | 4 bytes | 4 bytes |   4 bytes   | payload_len bytes |
//! +---------+---------+-------------+-------------------+
//! ```
//!
//! All header fields are big-endian `i32`. `id` is chosen by the caller and
//! echoed in the response; `op` selects the operation on requests and is
//! either echoed or set to [`ERROR_OP`](crate::op::ERROR_OP) on responses.

use crate::codec::{get_be, put_be};
use crate::error::{CodecError, ProtocolError};
use crate::op::ERROR_OP;
use crate::payload;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the frame header in bytes (3 x i32).
pub const FRAME_HEADER_SIZE: usize = 12;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub id: i32,
    pub op: i32,
    pub payload_len: i32,
}

impl FrameHeader {
    /// Writes the header into the first 12 bytes of `buf`.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        put_be(self.id, buf, 0)?;
        put_be(self.op, buf, 4)?;
        put_be(self.payload_len, buf, 8)
    }

    /// Reads a header from the first 12 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            id: get_be(buf, 0)?,
            op: get_be(buf, 4)?,
            payload_len: get_be(buf, 8)?,
        })
    }

    /// Validates the declared payload length and returns it as a size.
    pub fn payload_size(&self, max_payload: u32) -> Result<usize, ProtocolError> {
        match u32::try_from(self.payload_len) {
            Ok(len) if len <= max_payload => Ok(len as usize),
            _ => Err(ProtocolError::MalformedFrame {
                payload_len: self.payload_len,
                max: max_payload,
            }),
        }
    }
}

/// One request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Correlation id.
    pub id: i32,
    /// Operation code.
    pub op: i32,
    /// Frame payload (possibly empty, never absent).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a frame with the given payload.
    pub fn new(id: i32, op: i32, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            op,
            payload: payload.into(),
        }
    }

    /// Creates a frame with an empty payload.
    pub fn empty(id: i32, op: i32) -> Self {
        Self::new(id, op, Bytes::new())
    }

    /// Creates an error response carrying a diagnostic message.
    pub fn error(id: i32, message: &str) -> Self {
        let payload = payload::encode_str(message).unwrap_or_default();
        Self::new(id, ERROR_OP, payload)
    }

    /// Returns whether this is an error response.
    pub fn is_error(&self) -> bool {
        self.op == ERROR_OP
    }

    /// Decodes the diagnostic message of an error response.
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error() {
            return None;
        }
        Some(
            payload::decode_str(&self.payload)
                .unwrap_or_else(|_| String::from_utf8_lossy(&self.payload).into_owned()),
        )
    }

    /// Builds the wire header, checking the payload against `max_payload`.
    pub fn header(&self, max_payload: u32) -> Result<FrameHeader, ProtocolError> {
        let size = self.payload.len();
        let payload_len = u32::try_from(size)
            .ok()
            .filter(|len| *len <= max_payload)
            .and_then(|len| i32::try_from(len).ok())
            .ok_or(ProtocolError::FrameTooLarge {
                size,
                max: max_payload,
            })?;
        Ok(FrameHeader {
            id: self.id,
            op: self.op,
            payload_len,
        })
    }

    /// Appends the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut, max_payload: u32) -> Result<(), ProtocolError> {
        let header = self.header(max_payload)?;
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        header.encode_into(&mut raw)?;

        buf.reserve(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_slice(&raw);
        buf.put_slice(&self.payload);
        Ok(())
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        self.encode_into(&mut buf, MAX_PAYLOAD_SIZE)?;
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    /// A bad length field is reported as soon as the header is complete.
    pub fn decode(buf: &mut BytesMut, max_payload: u32) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let header = FrameHeader::decode(&buf[..FRAME_HEADER_SIZE])?;
        let payload_len = header.payload_size(max_payload)?;

        if buf.len() < FRAME_HEADER_SIZE + payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        Ok(Some(Self {
            id: header.id,
            op: header.op,
            payload,
        }))
    }
}

/// Incremental frame decoder over a growing byte buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload: u32,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_payload,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer, self.max_payload)
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
