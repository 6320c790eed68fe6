use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::thread;

use adapters_epmd::{port_please, register, NodeType};

fn fake_epmd(reply: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).unwrap();
        let len = u16::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).unwrap();
        stream.write_all(&reply).unwrap();
    });
    addr
}

#[test]
fn register_then_read_creation_round_trips_through_a_fake_epmd() {
    let addr = fake_epmd(vec![121, 0, 0x01, 0x02]);
    let registration = register(addr, "mynode", 4000, NodeType::Normal, 6, 5).unwrap();
    assert_eq!(registration.creation, 0x0102);
}

#[test]
fn port_please_resolves_a_peer_port() {
    let mut reply = vec![0u8, 0x1f, 0x90, 77, 0, 0, 6, 0, 5];
    reply.extend_from_slice(&0u16.to_be_bytes());
    reply.extend_from_slice(b"othernode");
    reply.extend_from_slice(&0u16.to_be_bytes());
    let addr = fake_epmd(reply);
    let resolved = port_please(addr, "othernode").unwrap();
    assert_eq!(resolved.port, 0x1f90);
    assert_eq!(resolved.node_type, NodeType::Normal);
}
