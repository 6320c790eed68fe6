//! Infrastructure Layer: External Term Format codec.
//!
//! Encodes and decodes `entities_term::Term` to and from the binary wire
//! format Erlang distribution and `term_to_binary`/`binary_to_term` use.
//! Wire shape for pids, ports and references depends on the handshake
//! flags negotiated with a given peer; see [`CodecFlags`].

mod constants;
mod decoding;
mod encoding;
mod error;
mod flags;
mod size;

pub use constants::VERSION_MAGIC;
pub use decoding::{dec_term, dec_term_int};
pub use encoding::{enc_term, enc_term_int};
pub use error::CodecError;
pub use flags::CodecFlags;
pub use size::{size_term, size_term_int};
