//! Transport-layer error type.

use std::fmt;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer's challenge-ack digest didn't match ours, or vice versa.
    AuthFailed,
    /// Peer replied with `nok`, `not_allowed`, or sent a message out of
    /// the expected handshake sequence.
    ProtocolError(String),
    /// A frame or handshake message arrived with a malformed length or
    /// was cut short.
    Truncated,
    /// The outbound queue is full; caller should retry once space frees up.
    WouldBlock,
    /// The connection was closed, locally or by the peer.
    Closed,
    IoError(String),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => TransportError::WouldBlock,
            io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => {
                TransportError::Closed
            }
            _ => TransportError::IoError(err.to_string()),
        }
    }
}

impl From<infrastructure_codec::CodecError> for TransportError {
    fn from(err: infrastructure_codec::CodecError) -> Self {
        TransportError::ProtocolError(err.to_string())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::AuthFailed => write!(f, "handshake cookie mismatch"),
            TransportError::ProtocolError(reason) => write!(f, "protocol error: {reason}"),
            TransportError::Truncated => write!(f, "frame truncated"),
            TransportError::WouldBlock => write!(f, "outbound queue full"),
            TransportError::Closed => write!(f, "connection closed"),
            TransportError::IoError(msg) => write!(f, "transport i/o error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}
