//! Adapters Layer: EPMD client.
//!
//! `epmd` (Erlang Port Mapper Daemon) is the name server nodes on a host
//! register with so other nodes can discover their listening port by short
//! name. This crate only speaks the two requests a connecting node needs:
//! [`client::register`] to publish a port, [`client::port_please`] to look
//! one up.

mod client;
mod error;
mod wire;

pub use client::{port_please, register, Registration};
pub use error::EpmdError;
pub use wire::{NodeType, PortResponse, DEFAULT_EPMD_PORT};
