//! Error type for EPMD requests.

use std::fmt;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpmdError {
    /// `epmd` is not listening on the configured port.
    ConnectionRefused,
    /// The connection dropped before a complete reply arrived.
    ConnectionReset,
    /// A reply's leading result byte was non-zero.
    RequestRejected(u8),
    /// A reply was shorter than its message implies.
    TruncatedReply,
    /// A node name is too long to fit the request's 16-bit length field.
    NameTooLong,
    IoError(String),
}

impl From<io::Error> for EpmdError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => EpmdError::ConnectionRefused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof => EpmdError::ConnectionReset,
            _ => EpmdError::IoError(err.to_string()),
        }
    }
}

impl fmt::Display for EpmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpmdError::ConnectionRefused => write!(f, "epmd refused the connection"),
            EpmdError::ConnectionReset => write!(f, "connection to epmd reset"),
            EpmdError::RequestRejected(code) => write!(f, "epmd rejected the request (result {code})"),
            EpmdError::TruncatedReply => write!(f, "epmd reply was truncated"),
            EpmdError::NameTooLong => write!(f, "node name too long for epmd's wire format"),
            EpmdError::IoError(msg) => write!(f, "epmd i/o error: {msg}"),
        }
    }
}

impl std::error::Error for EpmdError {}
