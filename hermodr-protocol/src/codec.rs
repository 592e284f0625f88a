//! Big-endian primitive codec.
//!
//! Every value is written to, or read from, an explicit offset inside a
//! caller-supplied buffer. The output never depends on the host byte order:
//! on little-endian hosts the native representation is byte-swapped before
//! it is copied out, on big-endian hosts it is copied as is.
//!
//! Signed integers go through the unsigned codec of the same width, and
//! floats through the unsigned codec matching their bit width, so no value
//! is ever converted numerically.

use crate::error::CodecError;

/// A fixed-width value with a big-endian wire representation.
pub trait BigEndian: Sized + Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Writes `self` at `offset` in `buf`.
    fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError>;

    /// Reads a value from `offset` in `buf`.
    fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError>;
}

/// Reverses the byte order of an integer.
pub trait SwapEndian: Sized {
    fn swap_endian(self) -> Self;
}

/// Writes `value` big-endian at `offset`.
#[inline]
pub fn put_be<T: BigEndian>(value: T, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
    value.put_be(buf, offset)
}

/// Reads a big-endian value at `offset`.
#[inline]
pub fn get_be<T: BigEndian>(buf: &[u8], offset: usize) -> Result<T, CodecError> {
    T::get_be(buf, offset)
}

/// Checks that `width` bytes starting at `offset` fit in a buffer of `len`.
#[inline]
pub fn check_range(len: usize, offset: usize, width: usize) -> Result<(), CodecError> {
    match offset.checked_add(width) {
        Some(end) if end <= len => Ok(()),
        _ => Err(CodecError::OutOfRange { offset, width, len }),
    }
}

#[inline]
fn host_is_little_endian() -> bool {
    cfg!(target_endian = "little")
}

macro_rules! impl_unsigned {
    ($($ty:ty),* $(,)?) => {$(
        impl SwapEndian for $ty {
            #[inline]
            fn swap_endian(self) -> Self {
                self.swap_bytes()
            }
        }

        impl BigEndian for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
                check_range(buf.len(), offset, Self::WIDTH)?;
                let value = if host_is_little_endian() {
                    self.swap_endian()
                } else {
                    self
                };
                buf[offset..offset + Self::WIDTH].copy_from_slice(&value.to_ne_bytes());
                Ok(())
            }

            #[inline]
            fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError> {
                check_range(buf.len(), offset, Self::WIDTH)?;
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&buf[offset..offset + Self::WIDTH]);
                let value = <$ty>::from_ne_bytes(raw);
                Ok(if host_is_little_endian() {
                    value.swap_endian()
                } else {
                    value
                })
            }
        }
    )*};
}

macro_rules! impl_signed {
    ($($ty:ty => $unsigned:ty),* $(,)?) => {$(
        impl SwapEndian for $ty {
            #[inline]
            fn swap_endian(self) -> Self {
                (self as $unsigned).swap_endian() as $ty
            }
        }

        impl BigEndian for $ty {
            const WIDTH: usize = <$unsigned as BigEndian>::WIDTH;

            #[inline]
            fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
                (self as $unsigned).put_be(buf, offset)
            }

            #[inline]
            fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError> {
                <$unsigned>::get_be(buf, offset).map(|bits| bits as $ty)
            }
        }
    )*};
}

macro_rules! impl_float {
    ($($ty:ty => $bits:ty),* $(,)?) => {$(
        impl BigEndian for $ty {
            const WIDTH: usize = <$bits as BigEndian>::WIDTH;

            #[inline]
            fn put_be(self, buf: &mut [u8], offset: usize) -> Result<(), CodecError> {
                self.to_bits().put_be(buf, offset)
            }

            #[inline]
            fn get_be(buf: &[u8], offset: usize) -> Result<Self, CodecError> {
                <$bits>::get_be(buf, offset).map(<$ty>::from_bits)
            }
        }
    )*};
}

impl_unsigned!(u16, u32, u64);
impl_signed!(i16 => u16, i32 => u32, i64 => u64);
impl_float!(f32 => u32, f64 => u64);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_u32_byte_order() {
        let mut buf = [0u8; 4];
        put_be(0x0102_0304u32, &mut buf, 0).unwrap();
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(get_be::<u32>(&buf, 0).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_widths_byte_order() {
        let mut buf = [0u8; 8];
        put_be(0x0102u16, &mut buf, 0).unwrap();
        assert_eq!(&buf[..2], &[0x01, 0x02]);

        put_be(0x0102_0304_0506_0708u64, &mut buf, 0).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);

        put_be(-2i32, &mut buf, 0).unwrap();
        assert_eq!(&buf[..4], &[0xFF, 0xFF, 0xFF, 0xFE]);

        put_be(1.0f32, &mut buf, 0).unwrap();
        assert_eq!(&buf[..4], &[0x3F, 0x80, 0x00, 0x00]);

        put_be(1.0f64, &mut buf, 0).unwrap();
        assert_eq!(buf, [0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_unaligned_offset() {
        let mut buf = [0u8; 7];
        put_be(0xA1B2_C3D4u32, &mut buf, 3).unwrap();
        assert_eq!(&buf[3..], &[0xA1, 0xB2, 0xC3, 0xD4]);
        assert_eq!(&buf[..3], &[0, 0, 0]);
        assert_eq!(get_be::<u32>(&buf, 3).unwrap(), 0xA1B2_C3D4);
    }

    #[test]
    fn test_boundary_offsets() {
        let mut buf = [0u8; 10];

        // Last offset where the value still fits.
        assert!(put_be(7u32, &mut buf, 6).is_ok());
        assert_eq!(get_be::<u32>(&buf, 6).unwrap(), 7);
        assert!(put_be(7u64, &mut buf, 2).is_ok());
        assert!(put_be(7u16, &mut buf, 8).is_ok());

        // One past it.
        assert_eq!(
            put_be(7u32, &mut buf, 7),
            Err(CodecError::OutOfRange {
                offset: 7,
                width: 4,
                len: 10
            })
        );
        assert!(matches!(get_be::<u64>(&buf, 3), Err(CodecError::OutOfRange { width: 8, .. })));
        assert!(matches!(get_be::<f32>(&buf, 7), Err(CodecError::OutOfRange { .. })));
        assert!(matches!(get_be::<i16>(&buf, 9), Err(CodecError::OutOfRange { .. })));
    }

    #[test]
    fn test_out_of_range_leaves_buffer_untouched() {
        let mut buf = [0xEEu8; 4];
        assert!(put_be(1u32, &mut buf, 1).is_err());
        assert_eq!(buf, [0xEE; 4]);
    }

    #[test]
    fn test_offset_overflow() {
        let buf = [0u8; 4];
        assert!(matches!(get_be::<u64>(&buf, usize::MAX), Err(CodecError::OutOfRange { .. })));
    }

    #[test]
    fn test_empty_buffer() {
        let mut buf: [u8; 0] = [];
        assert!(put_be(0u16, &mut buf, 0).is_err());
        assert!(get_be::<u16>(&buf, 0).is_err());
    }

    #[test]
    fn test_signed_swap_uses_bit_pattern() {
        assert_eq!((-1i32).swap_endian(), -1);
        assert_eq!(0x0000_0080i32.swap_endian(), i32::MIN);
        assert_eq!(i16::MIN.swap_endian(), 0x0080);
        assert_eq!(0x0102u16.swap_endian(), 0x0201);
        assert_eq!(1i64.swap_endian(), 0x0100_0000_0000_0000);
    }

    #[test]
    fn test_float_bit_patterns_preserved() {
        let mut buf = [0u8; 8];
        let nan = f32::from_bits(0x7FC0_1234);
        put_be(nan, &mut buf, 0).unwrap();
        assert_eq!(get_be::<f32>(&buf, 0).unwrap().to_bits(), 0x7FC0_1234);

        put_be(-0.0f64, &mut buf, 0).unwrap();
        assert_eq!(buf[0], 0x80);
        assert_eq!(get_be::<f64>(&buf, 0).unwrap().to_bits(), (-0.0f64).to_bits());
    }

    proptest! {
        #[test]
        fn prop_u16_roundtrip(v: u16, off in 0usize..8) {
            let mut buf = [0u8; 10];
            put_be(v, &mut buf, off).unwrap();
            prop_assert_eq!(get_be::<u16>(&buf, off).unwrap(), v);
            prop_assert_eq!(&buf[off..off + 2], &v.to_be_bytes()[..]);
        }

        #[test]
        fn prop_i16_roundtrip(v: i16, off in 0usize..8) {
            let mut buf = [0u8; 10];
            put_be(v, &mut buf, off).unwrap();
            prop_assert_eq!(get_be::<i16>(&buf, off).unwrap(), v);
        }

        #[test]
        fn prop_u32_roundtrip(v: u32, off in 0usize..6) {
            let mut buf = [0u8; 10];
            put_be(v, &mut buf, off).unwrap();
            prop_assert_eq!(get_be::<u32>(&buf, off).unwrap(), v);
            prop_assert_eq!(&buf[off..off + 4], &v.to_be_bytes()[..]);
        }

        #[test]
        fn prop_i32_roundtrip(v: i32, off in 0usize..6) {
            let mut buf = [0u8; 10];
            put_be(v, &mut buf, off).unwrap();
            prop_assert_eq!(get_be::<i32>(&buf, off).unwrap(), v);
        }

        #[test]
        fn prop_u64_roundtrip(v: u64, off in 0usize..8) {
            let mut buf = [0u8; 16];
            put_be(v, &mut buf, off).unwrap();
            prop_assert_eq!(get_be::<u64>(&buf, off).unwrap(), v);
            prop_assert_eq!(&buf[off..off + 8], &v.to_be_bytes()[..]);
        }

        #[test]
        fn prop_i64_roundtrip(v: i64, off in 0usize..8) {
            let mut buf = [0u8; 16];
            put_be(v, &mut buf, off).unwrap();
            prop_assert_eq!(get_be::<i64>(&buf, off).unwrap(), v);
        }

        #[test]
        fn prop_f32_bits_roundtrip(bits: u32, off in 0usize..6) {
            let mut buf = [0u8; 10];
            put_be(f32::from_bits(bits), &mut buf, off).unwrap();
            prop_assert_eq!(get_be::<f32>(&buf, off).unwrap().to_bits(), bits);
        }

        #[test]
        fn prop_f64_bits_roundtrip(bits: u64, off in 0usize..8) {
            let mut buf = [0u8; 16];
            put_be(f64::from_bits(bits), &mut buf, off).unwrap();
            prop_assert_eq!(get_be::<f64>(&buf, off).unwrap().to_bits(), bits);
        }

        #[test]
        fn prop_out_of_range_rejected(len in 0usize..12, off in 0usize..16) {
            let mut buf = vec![0u8; len];
            let fits = off + 4 <= len;
            prop_assert_eq!(put_be(1u32, &mut buf, off).is_ok(), fits);
            prop_assert_eq!(get_be::<i32>(&buf, off).is_ok(), fits);
        }
    }
}
