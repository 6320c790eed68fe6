//! EPMD client: register a node's listening port and look up peers.
//!
//! Grounded on the socket wrapper `adapters_socket` builds over `socket2`:
//! an address-family/type/protocol triple turned into a connected socket,
//! with `io::Error` folded into a small hand-rolled error enum. EPMD itself
//! is always TCP/IPv4 over loopback in practice, so this client skips the
//! family/type generality that wrapper carries and connects directly.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket as Socket2, Type};

use crate::error::EpmdError;
use crate::wire::{self, Alive2Response, NodeType, PortResponse};

fn connect(addr: SocketAddr, timeout: Option<Duration>) -> Result<TcpStream, EpmdError> {
    let socket = Socket2::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    let sock_addr = SockAddr::from(addr);
    match timeout {
        Some(t) => socket.connect_timeout(&sock_addr, t)?,
        None => socket.connect(&sock_addr)?,
    }
    Ok(socket.into())
}

fn request(stream: &mut TcpStream, body: &[u8]) -> Result<Vec<u8>, EpmdError> {
    let framed = wire::frame(body)?;
    stream.write_all(&framed)?;
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply)?;
    Ok(reply)
}

/// A live registration with epmd. Holds the connection open for as long as
/// the node should stay registered; epmd drops the node's entry as soon as
/// this socket closes, so callers must keep this alive for the node's
/// lifetime rather than reconnecting per request.
#[derive(Debug)]
pub struct Registration {
    _stream: TcpStream,
    pub creation: u16,
}

/// Register `node_name` (the short name before `@`) as listening on `port`,
/// and keep the connection alive for as long as the registration should
/// last.
pub fn register(
    epmd_addr: SocketAddr,
    node_name: &str,
    port: u16,
    node_type: NodeType,
    highest_version: u16,
    lowest_version: u16,
) -> Result<Registration, EpmdError> {
    let mut stream = connect(epmd_addr, Some(Duration::from_secs(5)))?;
    let body = wire::encode_alive2_req(node_name, port, node_type, highest_version, lowest_version);
    let reply = request(&mut stream, &body)?;
    let Alive2Response { creation } = wire::decode_alive2_resp(&reply)?;
    Ok(Registration { _stream: stream, creation })
}

/// Ask epmd which port `node_name` is listening on. Opens a short-lived
/// connection that closes once the reply is read.
pub fn port_please(epmd_addr: SocketAddr, node_name: &str) -> Result<PortResponse, EpmdError> {
    let mut stream = connect(epmd_addr, Some(Duration::from_secs(5)))?;
    let body = wire::encode_port_please2_req(node_name);
    let reply = request(&mut stream, &body)?;
    wire::decode_port2_resp(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, TcpListener};
    use std::thread;

    fn fake_epmd_alive2(reply: Vec<u8>) -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_listener = listener.try_clone().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = accept_listener.accept().unwrap();
            let mut len_buf = [0u8; 2];
            stream.read_exact(&mut len_buf).unwrap();
            let len = u16::from_be_bytes(len_buf) as usize;
            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).unwrap();
            stream.write_all(&reply).unwrap();
        });
        (listener, addr)
    }

    #[test]
    fn register_parses_creation_from_a_well_formed_reply() {
        let (_listener, addr) = fake_epmd_alive2(vec![wire::ALIVE2_RESP, 0, 0, 42]);
        let registration = register(addr, "node", 9999, NodeType::Normal, 6, 5).unwrap();
        assert_eq!(registration.creation, 42);
    }

    #[test]
    fn register_surfaces_rejection() {
        let (_listener, addr) = fake_epmd_alive2(vec![wire::ALIVE2_RESP, 1, 0, 0]);
        let err = register(addr, "node", 9999, NodeType::Normal, 6, 5).unwrap_err();
        assert_eq!(err, EpmdError::RequestRejected(1));
    }

    #[test]
    fn connect_to_nothing_listening_is_connection_refused() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = port_please(addr, "node").unwrap_err();
        assert_eq!(err, EpmdError::ConnectionRefused);
    }
}
