//! Local-only node scenarios: mailbox creation, registered-name send,
//! links, and monitors. A two-node scenario would need a live epmd and two
//! listening sockets, which these tests don't stand up; `adapters_epmd` and
//! `adapters_transport` each cover their own wire behavior in isolation.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;

use usecases_node::{MsgKind, Node, NodeError, Pid, SendTarget, Term};

fn fake_epmd() -> SocketAddr {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut len_buf = [0u8; 2];
            stream.read_exact(&mut len_buf).unwrap();
            let len = u16::from_be_bytes(len_buf) as usize;
            let mut body = vec![0u8; len];
            stream.read_exact(&mut body).unwrap();
            stream.write_all(&[121, 0, 0, 3]).unwrap();
        }
    });
    addr
}

fn test_node(short_name: &str) -> Node {
    Node::new(short_name, "host", 9999, "cookie", fake_epmd()).unwrap()
}

#[test]
fn mailbox_round_trips_a_registered_name_send() {
    let node = test_node("a");
    let server = node.create_mailbox(Some("server")).unwrap();
    let client = node.create_mailbox(None).unwrap();

    let name = node.atoms().lookup(b"server").unwrap();
    node.send(client.pid(), SendTarget::Name { name, node: None }, Term::Small(99)).unwrap();

    let msg = server.receive(Duration::from_millis(200)).unwrap();
    assert_eq!(msg.payload, Term::Small(99));
    assert_eq!(msg.sender, Some(client.pid()));
}

#[test]
fn send_to_an_unknown_pid_is_noproc() {
    let node = test_node("a");
    let sender = node.create_mailbox(None).unwrap();
    let ghost = Pid { node: node.local_node(), id: 9_999, serial: 0, creation: 1 };

    let result = node.send(sender.pid(), SendTarget::Pid(ghost), Term::Nil);
    assert_eq!(result, Err(NodeError::NoProc));
}

#[test]
fn link_then_close_delivers_exit_to_the_peer_mailbox() {
    let node = test_node("a");
    let left = node.create_mailbox(None).unwrap();
    let right = node.create_mailbox(None).unwrap();
    node.link(left.pid(), right.pid()).unwrap();

    node.close(Term::Atom(node.atoms().intern(b"shutdown").unwrap()));

    let left_msg = left.receive(Duration::from_millis(200)).unwrap();
    let right_msg = right.receive(Duration::from_millis(200)).unwrap();
    assert_eq!(left_msg.kind, MsgKind::Exit);
    assert_eq!(right_msg.kind, MsgKind::Exit);
}

#[test]
fn monitor_then_close_delivers_monitor_exit_to_the_watcher() {
    let node = test_node("a");
    let watcher = node.create_mailbox(None).unwrap();
    let target = node.create_mailbox(None).unwrap();
    let monitor_ref = node.monitor(watcher.pid(), Term::Pid(target.pid())).unwrap();

    node.close(Term::Atom(node.atoms().intern(b"normal").unwrap()));

    let msg = watcher.receive(Duration::from_millis(200)).unwrap();
    assert_eq!(msg.kind, MsgKind::MonitorExit);
    drop(monitor_ref);
}

#[test]
fn demonitor_before_close_suppresses_the_monitor_exit() {
    let node = test_node("a");
    let watcher = node.create_mailbox(None).unwrap();
    let target = node.create_mailbox(None).unwrap();
    let monitor_ref = node.monitor(watcher.pid(), Term::Pid(target.pid())).unwrap();
    node.demonitor(monitor_ref).unwrap();

    node.close(Term::Atom(node.atoms().intern(b"normal").unwrap()));

    let result = watcher.receive(Duration::from_millis(100));
    assert_eq!(result, Err(NodeError::Closed));
}
