//! Big-integer codec: the public encode/decode entry points that
//! `infrastructure_codec` calls for `Term::Big` values.

use crate::common::{decode_big_integer, encode_big_integer};
pub use crate::common::{DecodeError, EncodeError};
use malachite::Integer;

/// Encodes and decodes `malachite::Integer` values in the
/// `SMALL_BIG_EXT`/`LARGE_BIG_EXT` wire format.
pub struct BignumCodec;

impl BignumCodec {
    /// Encode `value`, returning the tag byte onward.
    pub fn encode(value: &Integer) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        let mut index = 0;
        encode_big_integer(&mut buf, &mut index, value)?;
        Ok(buf)
    }

    /// Decode a value starting at `data[0]`. Returns the value and the
    /// number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Integer, usize), DecodeError> {
        decode_big_integer(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_zero() {
        let zero = Integer::from(0);
        let encoded = BignumCodec::encode(&zero).unwrap();
        assert_eq!(encoded, vec![110, 1, 0, 0]);

        let (decoded, consumed) = BignumCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, zero);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn encode_decode_small_positive() {
        let value = Integer::from(42);
        let encoded = BignumCodec::encode(&value).unwrap();
        let (decoded, consumed) = BignumCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn encode_decode_small_negative() {
        let value = Integer::from(-42);
        let encoded = BignumCodec::encode(&value).unwrap();
        assert_eq!(encoded[2], 1, "sign byte must mark negative values");
        let (decoded, _) = BignumCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn encode_decode_beyond_i64() {
        let value = Integer::from(i64::MAX) * Integer::from(1000);
        let encoded = BignumCodec::encode(&value).unwrap();
        let (decoded, _) = BignumCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        assert!(BignumCodec::decode(&[110]).is_err());
    }
}
