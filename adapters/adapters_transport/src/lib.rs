//! Adapters Layer: distribution handshake and framed peer connection.
//!
//! Two independent pieces live here: [`handshake`] performs the
//! name/status/challenge/ack exchange that turns a freshly connected TCP
//! socket into an authenticated peer, and [`frame`] carries the control
//! tuples and payloads that flow over it afterward.

mod channel;
mod control;
mod error;
mod flags;
mod frame;
mod handshake;

pub use channel::Channel;
pub use control::{carries_payload, decode_control, encode_control, ControlMessage};
pub use error::TransportError;
pub use flags::DistFlags;
pub use frame::FrameConnection;
pub use handshake::{accept, connect, HandshakeOutcome, HandshakeState, PeerStatus};
