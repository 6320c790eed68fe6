//! Shared encode/decode helpers for the big-integer wire format.
//!
//! - `SMALL_BIG_EXT` (tag 110): 1 byte tag + 1 byte arity + 1 byte sign + n
//!   bytes (little-endian)
//! - `LARGE_BIG_EXT` (tag 111): 1 byte tag + 4 bytes arity (big-endian) + 1
//!   byte sign + n bytes (little-endian)

use malachite::Integer;

/// Encoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Magnitude exceeds the `LARGE_BIG_EXT` 32-bit arity field.
    ValueTooLarge,
}

/// Decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the tag/arity/sign header requires.
    BufferTooShort,
    /// First byte was neither 110 (`SMALL_BIG_EXT`) nor 111 (`LARGE_BIG_EXT`).
    InvalidFormat(String),
}

/// Encode `value` at `buf[*index..]`, growing `buf` as needed, and advance
/// `*index` past the bytes written. Returns the number of bytes written.
pub fn encode_big_integer(
    buf: &mut Vec<u8>,
    index: &mut usize,
    value: &Integer,
) -> Result<usize, EncodeError> {
    let start_index = *index;
    let (byte_vec, is_negative) = integer_to_bytes(value);
    let arity = byte_vec.len();

    if arity > u32::MAX as usize {
        return Err(EncodeError::ValueTooLarge);
    }

    if arity > 255 {
        let needed = 1 + 4 + 1 + arity;
        buf.resize(buf.len().max(*index + needed), 0);

        buf[*index] = 111; // LARGE_BIG_EXT
        *index += 1;
        buf[*index..*index + 4].copy_from_slice(&(arity as u32).to_be_bytes());
        *index += 4;
        buf[*index] = is_negative as u8;
        *index += 1;
        buf[*index..*index + arity].copy_from_slice(&byte_vec);
        *index += arity;
    } else {
        let needed = 1 + 1 + 1 + arity;
        buf.resize(buf.len().max(*index + needed), 0);

        buf[*index] = 110; // SMALL_BIG_EXT
        *index += 1;
        buf[*index] = arity as u8;
        *index += 1;
        buf[*index] = is_negative as u8;
        *index += 1;
        buf[*index..*index + arity].copy_from_slice(&byte_vec);
        *index += arity;
    }

    Ok(*index - start_index)
}

/// Decode a big integer from the start of `data`. Returns the value and the
/// number of bytes consumed.
pub fn decode_big_integer(data: &[u8]) -> Result<(Integer, usize), DecodeError> {
    let tag = *data.first().ok_or(DecodeError::BufferTooShort)?;
    let mut index = 1;

    let arity = match tag {
        110 => {
            let byte = *data.get(index).ok_or(DecodeError::BufferTooShort)?;
            index += 1;
            byte as usize
        }
        111 => {
            let word = data
                .get(index..index + 4)
                .ok_or(DecodeError::BufferTooShort)?;
            index += 4;
            u32::from_be_bytes(word.try_into().unwrap()) as usize
        }
        other => {
            return Err(DecodeError::InvalidFormat(format!(
                "expected big integer tag 110 or 111, got {other}"
            )))
        }
    };

    let is_negative = *data.get(index).ok_or(DecodeError::BufferTooShort)? != 0;
    index += 1;

    let bytes = data
        .get(index..index + arity)
        .ok_or(DecodeError::BufferTooShort)?;
    index += arity;

    Ok((bytes_to_integer(bytes, is_negative), index))
}

/// The magnitude of `value` as little-endian bytes, plus its sign.
pub fn integer_to_bytes(value: &Integer) -> (Vec<u8>, bool) {
    let is_negative = *value < Integer::from(0);
    let mut v = if is_negative {
        -value.clone()
    } else {
        value.clone()
    };
    let base = Integer::from(256u64);

    let mut byte_vec = Vec::new();
    if v == Integer::from(0) {
        byte_vec.push(0);
    } else {
        while v > Integer::from(0) {
            let remainder = &v % &base;
            let rem_u64 = u64::try_from(&remainder).unwrap_or(0);
            byte_vec.push(rem_u64 as u8);
            v = &v / &base;
        }
    }
    (byte_vec, is_negative)
}

/// Reconstruct an `Integer` from its little-endian magnitude bytes and sign.
pub fn bytes_to_integer(bytes: &[u8], is_negative: bool) -> Integer {
    let mut value = Integer::from(0);
    let mut multiplier = Integer::from(1u64);

    for &byte in bytes {
        value += Integer::from(byte) * &multiplier;
        multiplier *= Integer::from(256u64);
    }

    if is_negative {
        -value
    } else {
        value
    }
}
