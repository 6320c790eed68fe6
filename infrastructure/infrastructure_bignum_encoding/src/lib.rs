//! Infrastructure Layer: Bignum Encoding
//!
//! Encodes and decodes arbitrary-precision integers (`malachite::Integer`)
//! in the `SMALL_BIG_EXT`/`LARGE_BIG_EXT` wire format used by `term_to_binary`
//! and distribution traffic alike.
//!
//! ## Format
//!
//! - `SMALL_BIG_EXT` (tag 110): 1 byte tag + 1 byte arity + 1 byte sign + n
//!   bytes (little-endian magnitude)
//! - `LARGE_BIG_EXT` (tag 111): 1 byte tag + 4 bytes arity (big-endian) + 1
//!   byte sign + n bytes (little-endian magnitude)

mod common;

pub mod bignum_codec;

pub use bignum_codec::BignumCodec;
pub use common::{bytes_to_integer, integer_to_bytes, DecodeError, EncodeError};
