//! Node runtime error type.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeError {
    /// Registering with EPMD failed; node construction aborts.
    EpmdError(String),
    /// The handshake or framed connection to a peer failed.
    TransportError(String),
    /// `send` targeted a registered name with nothing behind it locally.
    NoProc,
    /// The connection to the named remote node is gone, or never formed.
    NoConnection,
    /// An inbound frame could not be decoded; the connection it arrived on
    /// is closed.
    ProtocolError(String),
    /// `register` was called with a name already bound to another pid.
    NameInUse,
    /// `receive`/`receive_match` found nothing before timeout.
    Timeout,
    /// The mailbox was explicitly closed, or the node shut down, while a
    /// caller was waiting on it.
    Closed,
}

impl From<adapters_epmd::EpmdError> for NodeError {
    fn from(err: adapters_epmd::EpmdError) -> Self {
        NodeError::EpmdError(err.to_string())
    }
}

impl From<adapters_transport::TransportError> for NodeError {
    fn from(err: adapters_transport::TransportError) -> Self {
        match err {
            adapters_transport::TransportError::Closed => NodeError::NoConnection,
            other => NodeError::TransportError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::TransportError(err.to_string())
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::EpmdError(msg) => write!(f, "epmd_error: {msg}"),
            NodeError::TransportError(msg) => write!(f, "transport error: {msg}"),
            NodeError::NoProc => write!(f, "noproc"),
            NodeError::NoConnection => write!(f, "noconnection"),
            NodeError::ProtocolError(msg) => write!(f, "protocol_error: {msg}"),
            NodeError::NameInUse => write!(f, "name already registered"),
            NodeError::Timeout => write!(f, "timeout"),
            NodeError::Closed => write!(f, "closed"),
        }
    }
}

impl std::error::Error for NodeError {}
