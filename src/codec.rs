//! Binary encoding of keys and values stored in pages
//!
//! Fixed-width integers use their native width in little-endian order.
//! Variable-length types carry a little-endian `u32` length prefix.

use crate::error::{Error, PageId, Result};
use byteorder::{ByteOrder, LittleEndian};

const LEN_PREFIX: usize = 4;

/// Encoding of a key or value into a byte range of a page
pub trait Codec: Sized {
    /// Number of bytes `encode` will write
    fn encoded_len(&self) -> usize;

    /// Length of the encoded value that starts at `bytes[0]`
    fn encoded_len_at(bytes: &[u8]) -> Result<usize>;

    /// Write the encoding into `out`, which holds at least `encoded_len()` bytes
    fn encode(&self, out: &mut [u8]);

    /// Decode a value from the start of `bytes`
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Decode the value at the start of `bytes`, returning it with its encoded length
pub fn decode_prefix<T: Codec>(bytes: &[u8]) -> Result<(T, usize)> {
    let len = T::encoded_len_at(bytes)?;
    let value = T::decode(&bytes[..len])?;
    Ok((value, len))
}

fn truncated(needed: usize, available: usize) -> Error {
    Error::Decoding(format!("need {} bytes, only {} available", needed, available).into())
}

#[inline]
fn fixed_len_at(width: usize, bytes: &[u8]) -> Result<usize> {
    if bytes.len() < width {
        return Err(truncated(width, bytes.len()));
    }
    Ok(width)
}

macro_rules! impl_fixed_codec {
    ($($ty:ty => $read:ident, $write:ident;)*) => {
        $(
            impl Codec for $ty {
                #[inline]
                fn encoded_len(&self) -> usize {
                    std::mem::size_of::<$ty>()
                }

                #[inline]
                fn encoded_len_at(bytes: &[u8]) -> Result<usize> {
                    fixed_len_at(std::mem::size_of::<$ty>(), bytes)
                }

                #[inline]
                fn encode(&self, out: &mut [u8]) {
                    LittleEndian::$write(out, *self);
                }

                #[inline]
                fn decode(bytes: &[u8]) -> Result<Self> {
                    fixed_len_at(std::mem::size_of::<$ty>(), bytes)?;
                    Ok(LittleEndian::$read(bytes))
                }
            }
        )*
    };
}

impl_fixed_codec! {
    u16 => read_u16, write_u16;
    u32 => read_u32, write_u32;
    u64 => read_u64, write_u64;
    i16 => read_i16, write_i16;
    i32 => read_i32, write_i32;
    i64 => read_i64, write_i64;
}

impl Codec for u8 {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encoded_len_at(bytes: &[u8]) -> Result<usize> {
        fixed_len_at(1, bytes)
    }

    fn encode(&self, out: &mut [u8]) {
        out[0] = *self;
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        bytes.first().copied().ok_or_else(|| truncated(1, 0))
    }
}

impl Codec for i8 {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encoded_len_at(bytes: &[u8]) -> Result<usize> {
        fixed_len_at(1, bytes)
    }

    fn encode(&self, out: &mut [u8]) {
        out[0] = *self as u8;
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        bytes.first().map(|b| *b as i8).ok_or_else(|| truncated(1, 0))
    }
}

/// Child pointers inside inner pages
impl Codec for PageId {
    fn encoded_len(&self) -> usize {
        4
    }

    fn encoded_len_at(bytes: &[u8]) -> Result<usize> {
        fixed_len_at(4, bytes)
    }

    fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_i32(out, self.to_raw());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        fixed_len_at(4, bytes)?;
        let raw = LittleEndian::read_i32(bytes);
        PageId::from_raw(raw)
            .ok_or_else(|| Error::Decoding(format!("negative child pointer {}", raw).into()))
    }
}

fn prefixed_len_at(bytes: &[u8]) -> Result<usize> {
    fixed_len_at(LEN_PREFIX, bytes)?;
    let body = LittleEndian::read_u32(bytes) as usize;
    let total = LEN_PREFIX + body;
    if bytes.len() < total {
        return Err(truncated(total, bytes.len()));
    }
    Ok(total)
}

fn encode_prefixed(body: &[u8], out: &mut [u8]) {
    LittleEndian::write_u32(out, body.len() as u32);
    out[LEN_PREFIX..LEN_PREFIX + body.len()].copy_from_slice(body);
}

impl Codec for Vec<u8> {
    fn encoded_len(&self) -> usize {
        LEN_PREFIX + self.len()
    }

    fn encoded_len_at(bytes: &[u8]) -> Result<usize> {
        prefixed_len_at(bytes)
    }

    fn encode(&self, out: &mut [u8]) {
        encode_prefixed(self, out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let total = prefixed_len_at(bytes)?;
        Ok(bytes[LEN_PREFIX..total].to_vec())
    }
}

impl Codec for String {
    fn encoded_len(&self) -> usize {
        LEN_PREFIX + self.len()
    }

    fn encoded_len_at(bytes: &[u8]) -> Result<usize> {
        prefixed_len_at(bytes)
    }

    fn encode(&self, out: &mut [u8]) {
        encode_prefixed(self.as_bytes(), out);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let total = prefixed_len_at(bytes)?;
        String::from_utf8(bytes[LEN_PREFIX..total].to_vec())
            .map_err(|e| Error::Decoding(format!("invalid utf-8 string: {}", e).into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded<T: Codec>(value: &T) -> Vec<u8> {
        let mut out = vec![0u8; value.encoded_len()];
        value.encode(&mut out);
        out
    }

    #[test]
    fn test_fixed_width_layout() {
        assert_eq!(encoded(&0x0102_0304u32), vec![4, 3, 2, 1]);
        assert_eq!(encoded(&-1i32), vec![0xFF; 4]);
        assert_eq!(encoded(&7u8), vec![7]);
        assert_eq!(u64::encoded_len_at(&[0u8; 12]).unwrap(), 8);
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let bytes = encoded(&"abc".to_string());
        assert_eq!(bytes, vec![3, 0, 0, 0, b'a', b'b', b'c']);

        let mut trailing = bytes.clone();
        trailing.extend_from_slice(&[9, 9]);
        let (value, len) = decode_prefix::<String>(&trailing).unwrap();
        assert_eq!(value, "abc");
        assert_eq!(len, 7);
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(u32::decode(&[1, 2]), Err(Error::Decoding(_))));
        assert!(matches!(Vec::<u8>::encoded_len_at(&[5, 0, 0, 0, 1]), Err(Error::Decoding(_))));
        assert!(matches!(u8::decode(&[]), Err(Error::Decoding(_))));
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes = [2, 0, 0, 0, 0xC3, 0x28];
        assert!(matches!(String::decode(&bytes), Err(Error::Decoding(_))));
    }

    #[test]
    fn test_page_id_pointer() {
        assert_eq!(encoded(&PageId(5)), vec![5, 0, 0, 0]);
        assert!(PageId::decode(&[0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }
}
