//! Protocol error types.

use std::fmt;
use thiserror::Error;

/// Errors raised by the big-endian codec.
///
/// These indicate a caller bug (an offset computed past the end of the
/// buffer), never bad input from the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("offset {offset} out of range: {width} bytes do not fit in a buffer of {len}")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },
}

/// Errors raised while encoding or decoding an op payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("length prefix {len} exceeds the {remaining} bytes remaining")]
    Truncated { len: usize, remaining: usize },

    #[error("value of {0} bytes does not fit a 32-bit length prefix")]
    TooLong(usize),

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

/// Part of a frame that was being read when the stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSection {
    Header,
    Payload,
}

impl fmt::Display for FrameSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSection::Header => write!(f, "header"),
            FrameSection::Payload => write!(f, "payload"),
        }
    }
}

/// Frame-level errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: payload length {payload_len} outside 0..={max}")]
    MalformedFrame { payload_len: i32, max: u32 },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: u32 },

    #[error("connection closed while reading frame {section}: {read} of {expected} bytes")]
    ConnectionClosed {
        section: FrameSection,
        read: usize,
        expected: usize,
    },

    #[error("connection already closed")]
    AlreadyClosed,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether the peer is gone, either cleanly or mid-frame.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            ProtocolError::ConnectionClosed { .. } | ProtocolError::AlreadyClosed => true,
            ProtocolError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// Returns whether the stream ended part way through a frame, as
    /// opposed to the peer simply having nothing more to send.
    pub fn is_truncated_frame(&self) -> bool {
        match self {
            ProtocolError::ConnectionClosed {
                section: FrameSection::Payload,
                ..
            } => true,
            ProtocolError::ConnectionClosed {
                section: FrameSection::Header,
                read,
                ..
            } => *read > 0,
            _ => false,
        }
    }
}
