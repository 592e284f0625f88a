//! Op payload encoding.
//!
//! Payloads are flat sequences of big-endian values. Strings are an `i32`
//! byte length followed by UTF-8 bytes; string lists are an `i32` element
//! count followed by that many strings.

use crate::codec::BigEndian;
use crate::error::PayloadError;
use bytes::{Bytes, BytesMut};

/// Appends big-endian values to a growable payload buffer.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends a fixed-width value.
    pub fn put<T: BigEndian>(&mut self, value: T) -> Result<&mut Self, PayloadError> {
        let offset = self.buf.len();
        self.buf.resize(offset + T::WIDTH, 0);
        value.put_be(&mut self.buf, offset)?;
        Ok(self)
    }

    /// Appends a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, value: &str) -> Result<&mut Self, PayloadError> {
        self.put(length_prefix(value.len())?)?;
        self.buf.extend_from_slice(value.as_bytes());
        Ok(self)
    }

    /// Appends a count-prefixed list of strings.
    pub fn put_str_list<S: AsRef<str>>(&mut self, values: &[S]) -> Result<&mut Self, PayloadError> {
        self.put(length_prefix(values.len())?)?;
        for value in values {
            self.put_str(value.as_ref())?;
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the encoded payload.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

fn length_prefix(len: usize) -> Result<i32, PayloadError> {
    i32::try_from(len).map_err(|_| PayloadError::TooLong(len))
}

/// Reads big-endian values sequentially from a payload.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Reads the next fixed-width value.
    pub fn get<T: BigEndian>(&mut self) -> Result<T, PayloadError> {
        let value = T::get_be(self.buf, self.offset)?;
        self.offset += T::WIDTH;
        Ok(value)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn get_str(&mut self) -> Result<String, PayloadError> {
        let len = self.get_len()?;
        let remaining = self.remaining();
        if len > remaining {
            return Err(PayloadError::Truncated { len, remaining });
        }
        let bytes = &self.buf[self.offset..self.offset + len];
        let value = std::str::from_utf8(bytes).map_err(|_| PayloadError::InvalidUtf8)?;
        self.offset += len;
        Ok(value.to_string())
    }

    /// Reads a count-prefixed list of strings.
    pub fn get_str_list(&mut self) -> Result<Vec<String>, PayloadError> {
        let count = self.get_len()?;
        // Every string needs at least its 4-byte prefix.
        let mut values = Vec::with_capacity(count.min(self.remaining() / 4));
        for _ in 0..count {
            values.push(self.get_str()?);
        }
        Ok(values)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Fails if anything is left unread.
    pub fn finish(self) -> Result<(), PayloadError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(PayloadError::TrailingBytes(n)),
        }
    }

    fn get_len(&mut self) -> Result<usize, PayloadError> {
        let len: i32 = self.get()?;
        usize::try_from(len).map_err(|_| PayloadError::NegativeLength(len))
    }
}

/// Encodes a single string payload.
pub fn encode_str(value: &str) -> Result<Bytes, PayloadError> {
    let mut writer = PayloadWriter::with_capacity(4 + value.len());
    writer.put_str(value)?;
    Ok(writer.finish())
}

/// Decodes a payload consisting of exactly one string.
pub fn decode_str(payload: &[u8]) -> Result<String, PayloadError> {
    let mut reader = PayloadReader::new(payload);
    let value = reader.get_str()?;
    reader.finish()?;
    Ok(value)
}
