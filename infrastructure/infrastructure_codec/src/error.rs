//! Codec error type, bridged from the layers underneath.

use entities_atom::AtomError;
use infrastructure_bignum_encoding::{DecodeError as BigDecodeError, EncodeError as BigEncodeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Ran out of input bytes mid-term.
    UnexpectedEof,
    /// The leading byte was not the version magic (131).
    MissingVersionMagic,
    /// A tag byte this codec doesn't recognize.
    UnknownTag(u8),
    /// An atom's bytes were not valid UTF-8 under a UTF8 atom tag.
    InvalidUtf8,
    /// A length field doesn't fit the value it's paired with.
    LengthMismatch,
    /// The atom table rejected an intern (too long, or full).
    Atom(AtomError),
    /// Magnitude too large for the big-integer wire format.
    IntegerTooLarge,
    /// An `Atom` handle was not found in the table passed to the codec.
    AtomNotInterned,
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::UnexpectedEof => write!(f, "unexpected end of input"),
            CodecError::MissingVersionMagic => write!(f, "missing version magic byte (131)"),
            CodecError::UnknownTag(tag) => write!(f, "unknown term tag {tag}"),
            CodecError::InvalidUtf8 => write!(f, "atom bytes are not valid UTF-8"),
            CodecError::LengthMismatch => write!(f, "length field does not match available data"),
            CodecError::Atom(e) => write!(f, "atom table error: {e}"),
            CodecError::IntegerTooLarge => write!(f, "integer magnitude too large to encode"),
            CodecError::AtomNotInterned => write!(f, "atom handle not found in the given table"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<AtomError> for CodecError {
    fn from(e: AtomError) -> Self {
        CodecError::Atom(e)
    }
}

impl From<BigDecodeError> for CodecError {
    fn from(e: BigDecodeError) -> Self {
        match e {
            BigDecodeError::BufferTooShort => CodecError::UnexpectedEof,
            BigDecodeError::InvalidFormat(_) => CodecError::UnknownTag(0),
        }
    }
}

impl From<BigEncodeError> for CodecError {
    fn from(_: BigEncodeError) -> Self {
        CodecError::IntegerTooLarge
    }
}
