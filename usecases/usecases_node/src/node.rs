//! The `Node` facade: one distribution node's identity, its mailbox
//! registry, and the set of live peer connections it drives.
//!
//! Every public method takes `&self` and locks a single internal mutex for
//! the duration of the call. There is no executor thread inside `Node`
//! itself: a caller drives the reactor by calling [`Node::accept_one`] when
//! a listener has a pending connection and [`Node::poll`] when a connected
//! peer has data waiting.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Mutex;

use adapters_epmd::NodeType;
use adapters_transport::ControlMessage;
use entities_atom::{Atom, AtomTable};
use entities_term::{Pid, Reference, Term};

use crate::connection::Connection;
use crate::error::NodeError;
use crate::mailbox::{Mailbox, MailboxState};
use crate::message::{MsgKind, TransportMsg};
use crate::registry::{IdAllocator, Registry};
use crate::verbosity::{self, Verbosity};

/// Where a [`Node::send`] should deliver to.
pub enum SendTarget {
    Pid(Pid),
    /// A registered name, on the local node if `node` is `None`.
    Name { name: Atom, node: Option<Atom> },
}

struct NodeInner {
    local_node: Atom,
    local_node_name: String,
    cookie: String,
    alloc: IdAllocator,
    registry: Registry,
    connections: HashMap<Atom, Connection>,
    _registration: adapters_epmd::Registration,
}

pub struct Node {
    atoms: AtomTable,
    inner: Mutex<NodeInner>,
}

impl Node {
    /// Register `short_name@host` with epmd at `epmd_addr` as listening on
    /// `listen_port`, and build an empty node around it. `listen_port` is
    /// not bound here; the caller owns the `TcpListener` and hands accepted
    /// streams to [`Node::accept_one`].
    pub fn new(short_name: &str, host: &str, listen_port: u16, cookie: &str, epmd_addr: SocketAddr) -> Result<Node, NodeError> {
        let atoms = AtomTable::new();
        let full_name = format!("{short_name}@{host}");
        let local_node = atoms
            .intern(full_name.as_bytes())
            .map_err(|_| NodeError::ProtocolError("node name is not a valid atom".into()))?;

        let registration = adapters_epmd::register(epmd_addr, short_name, listen_port, NodeType::Normal, 6, 5)?;
        let creation = registration.creation as u32;
        verbosity::report(Verbosity::Info, || format!("registered {full_name} with epmd, creation {creation}"));

        Ok(Node {
            atoms,
            inner: Mutex::new(NodeInner {
                local_node,
                local_node_name: full_name,
                cookie: cookie.to_string(),
                alloc: IdAllocator::new(local_node, creation),
                registry: Registry::default(),
                connections: HashMap::new(),
                _registration: registration,
            }),
        })
    }

    /// The atom table backing every `Term`/`Pid`/`Reference` this node
    /// hands out; callers building terms to pass to `send` must intern
    /// through this table.
    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    pub fn local_node(&self) -> Atom {
        self.inner.lock().unwrap().local_node
    }

    /// Allocate a pid and an empty mailbox, optionally registering it under
    /// `name` atomically with creation.
    pub fn create_mailbox(&self, name: Option<&str>) -> Result<Mailbox, NodeError> {
        let mut inner = self.inner.lock().unwrap();
        let pid = inner.alloc.next_pid();
        let name_atom = match name {
            Some(n) => Some(
                self.atoms
                    .intern(n.as_bytes())
                    .map_err(|_| NodeError::ProtocolError("mailbox name is not a valid atom".into()))?,
            ),
            None => None,
        };
        let state = MailboxState::new(pid.clone(), name_atom);
        inner.registry.insert_mailbox(state.clone());
        if let Some(atom) = name_atom {
            if let Err(err) = inner.registry.register(atom, pid) {
                inner.registry.remove_mailbox(&state.pid);
                return Err(err);
            }
        }
        Ok(Mailbox::new(state))
    }

    pub fn register(&self, name: &str, pid: Pid) -> Result<(), NodeError> {
        let mut inner = self.inner.lock().unwrap();
        let atom = self
            .atoms
            .intern(name.as_bytes())
            .map_err(|_| NodeError::ProtocolError("name is not a valid atom".into()))?;
        inner.registry.register(atom, pid)
    }

    pub fn unregister(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(atom) = self.atoms.lookup(name.as_bytes()) {
            inner.registry.unregister(atom);
        }
    }

    pub fn whereis(&self, name: &str) -> Option<Pid> {
        let inner = self.inner.lock().unwrap();
        self.atoms.lookup(name.as_bytes()).and_then(|atom| inner.registry.whereis(atom))
    }

    fn ensure_connected(&self, inner: &mut NodeInner, peer: Atom) -> Result<(), NodeError> {
        if inner.connections.contains_key(&peer) {
            return Ok(());
        }
        let full = self.atoms.name(peer).ok_or(NodeError::NoConnection)?;
        let full_name = String::from_utf8_lossy(&full).into_owned();
        let (peer_short, peer_host) = full_name
            .split_once('@')
            .ok_or_else(|| NodeError::ProtocolError(format!("{full_name} has no host part")))?;
        let conn = Connection::establish(
            peer,
            peer_short,
            peer_host,
            adapters_epmd::DEFAULT_EPMD_PORT,
            &inner.local_node_name,
            &inner.cookie,
        )?;
        inner.connections.insert(peer, conn);
        Ok(())
    }

    /// Deliver `term` from `from` to `to`, connecting to the target's node
    /// on demand if it isn't local.
    pub fn send(&self, from: Pid, to: SendTarget, term: Term) -> Result<(), NodeError> {
        let mut inner = self.inner.lock().unwrap();
        match to {
            SendTarget::Pid(pid) => {
                if pid.node == inner.local_node {
                    let mailbox = inner.registry.mailbox(&pid).ok_or(NodeError::NoProc)?;
                    mailbox.state.deliver(TransportMsg::new(MsgKind::Send, Some(from), term));
                    Ok(())
                } else {
                    self.ensure_connected(&mut inner, pid.node)?;
                    let conn = inner.connections.get_mut(&pid.node).expect("just connected");
                    conn.send_control(&ControlMessage::Send { from, to: pid }, Some(&term), &self.atoms)
                }
            }
            SendTarget::Name { name, node } => {
                let node = node.unwrap_or(inner.local_node);
                if node == inner.local_node {
                    let pid = inner.registry.whereis(name).ok_or(NodeError::NoProc)?;
                    let mailbox = inner.registry.mailbox(&pid).ok_or(NodeError::NoProc)?;
                    mailbox.state.deliver(TransportMsg::new(MsgKind::RegSend, Some(from), term));
                    Ok(())
                } else {
                    self.ensure_connected(&mut inner, node)?;
                    let conn = inner.connections.get_mut(&node).expect("just connected");
                    conn.send_control(&ControlMessage::RegSend { from, to_name: Term::Atom(name) }, Some(&term), &self.atoms)
                }
            }
        }
    }

    pub fn link(&self, a: Pid, b: Pid) -> Result<(), NodeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.registry.link(a.clone(), b.clone());
        if b.node != inner.local_node {
            self.ensure_connected(&mut inner, b.node)?;
            let conn = inner.connections.get_mut(&b.node).expect("just connected");
            conn.send_control(&ControlMessage::Link { from: a, to: b }, None, &self.atoms)?;
        }
        Ok(())
    }

    pub fn unlink(&self, a: Pid, b: Pid) -> Result<(), NodeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.registry.unlink(a.clone(), b.clone());
        if b.node != inner.local_node {
            if let Some(conn) = inner.connections.get_mut(&b.node) {
                conn.send_control(&ControlMessage::Unlink { from: a, to: b }, None, &self.atoms)?;
            }
        }
        Ok(())
    }

    /// Start watching `target` (a pid, local or remote). Returns the
    /// monitor reference a later `demonitor` or an incoming `monitor_exit`
    /// message carries.
    pub fn monitor(&self, watcher: Pid, target: Term) -> Result<Reference, NodeError> {
        let mut inner = self.inner.lock().unwrap();
        let monitor_ref = inner.alloc.next_ref();
        let target_node = match &target {
            Term::Pid(target_pid) => Some(target_pid.node),
            _ => None,
        };
        inner.registry.monitor(monitor_ref.clone(), watcher.clone(), target.clone());

        if let Some(remote_node) = target_node {
            if remote_node != inner.local_node {
                self.ensure_connected(&mut inner, remote_node)?;
                let conn = inner.connections.get_mut(&remote_node).expect("just connected");
                conn.send_control(
                    &ControlMessage::Monitor { from: watcher, to: target, monitor_ref: monitor_ref.clone() },
                    None,
                    &self.atoms,
                )?;
            }
        }
        Ok(monitor_ref)
    }

    pub fn demonitor(&self, monitor_ref: Reference) -> Result<(), NodeError> {
        let mut inner = self.inner.lock().unwrap();
        let Some((watcher, target)) = inner.registry.demonitor(&monitor_ref) else {
            return Ok(());
        };
        let target_node = match &target {
            Term::Pid(target_pid) => Some(target_pid.node),
            _ => None,
        };
        if let Some(remote_node) = target_node {
            if remote_node != inner.local_node {
                if let Some(conn) = inner.connections.get_mut(&remote_node) {
                    conn.send_control(&ControlMessage::Demonitor { from: watcher, to: target, monitor_ref }, None, &self.atoms)?;
                }
            }
        }
        Ok(())
    }

    /// Accept one pending connection off `listener` and run the accepting
    /// side of the handshake over it. Returns the peer's node atom.
    pub fn accept_one(&self, listener: &TcpListener) -> Result<Atom, NodeError> {
        let (stream, _) = listener.accept()?;
        let mut inner = self.inner.lock().unwrap();
        let conn = Connection::accept(stream, &inner.local_node_name, &inner.cookie, &self.atoms)?;
        let peer = conn.peer;
        inner.connections.insert(peer, conn);
        verbosity::report(Verbosity::Info, || format!("accepted connection from {peer:?}"));
        Ok(peer)
    }

    /// Read and dispatch one frame from the connection to `peer`. `Ok(())`
    /// covers both a delivered control message and a tick; a transport
    /// error tears the connection down and fires `noconnection` to every
    /// local mailbox linked or monitoring across it.
    pub fn poll(&self, peer: Atom) -> Result<(), NodeError> {
        let mut inner = self.inner.lock().unwrap();
        let frame = match inner.connections.get_mut(&peer) {
            Some(conn) => conn.recv_control(&self.atoms),
            None => return Err(NodeError::NoConnection),
        };
        match frame {
            Ok(Some((control, payload))) => {
                self.dispatch(&mut inner, control, payload);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                verbosity::report(Verbosity::Debug, || format!("connection to {peer:?} failed: {err}"));
                inner.connections.remove(&peer);
                self.fail_peer(&mut inner, peer);
                Err(err)
            }
        }
    }

    fn dispatch(&self, inner: &mut NodeInner, control: ControlMessage, payload: Option<Term>) {
        match control {
            ControlMessage::Link { from, to } => inner.registry.link(from, to),
            ControlMessage::Unlink { from, to } => inner.registry.unlink(from, to),
            ControlMessage::Send { from, to } => {
                if let Some(mailbox) = inner.registry.mailbox(&to) {
                    mailbox.state.deliver(TransportMsg::new(MsgKind::Send, Some(from), payload.unwrap_or(Term::Nil)));
                }
            }
            ControlMessage::RegSend { from, to_name } => {
                if let Term::Atom(name) = to_name {
                    if let Some(pid) = inner.registry.whereis(name) {
                        if let Some(mailbox) = inner.registry.mailbox(&pid) {
                            mailbox.state.deliver(TransportMsg::new(MsgKind::RegSend, Some(from), payload.unwrap_or(Term::Nil)));
                        }
                    }
                }
            }
            ControlMessage::Exit { from, to, reason } => {
                inner.registry.unlink(from.clone(), to.clone());
                if let Some(mailbox) = inner.registry.mailbox(&to) {
                    mailbox.state.deliver(TransportMsg::new(MsgKind::Exit, Some(from), reason));
                }
            }
            ControlMessage::Exit2 { from, to, reason } => {
                if let Some(mailbox) = inner.registry.mailbox(&to) {
                    mailbox.state.deliver(TransportMsg::new(MsgKind::Exit2, Some(from), reason));
                }
            }
            ControlMessage::Monitor { from, to, monitor_ref } => {
                inner.registry.monitor(monitor_ref, from, to);
            }
            ControlMessage::Demonitor { monitor_ref, .. } => {
                inner.registry.demonitor(&monitor_ref);
            }
            ControlMessage::MonitorExit { to, reason, .. } => {
                if let Some(mailbox) = inner.registry.mailbox(&to) {
                    mailbox.state.deliver(TransportMsg::new(MsgKind::MonitorExit, None, reason));
                }
            }
        }
    }

    /// Connection to `peer` is gone: fire `noconnection` to every local
    /// mailbox linked to, or monitoring, a pid on that node.
    fn fail_peer(&self, inner: &mut NodeInner, peer: Atom) {
        let noconnection = Term::Atom(self.atoms.intern(b"noconnection").expect("noconnection interns"));
        let mailboxes: Vec<_> = inner.registry.all_mailboxes().cloned().collect();
        for mailbox_state in &mailboxes {
            let pid = mailbox_state.pid.clone();
            for linked in inner.registry.linked_to(&pid) {
                if linked.node == peer {
                    mailbox_state.deliver(TransportMsg::new(MsgKind::Exit, Some(linked.clone()), noconnection.clone()));
                    inner.registry.unlink(pid.clone(), linked);
                }
            }
        }
        for (monitor_ref, watcher, target) in inner.registry.monitors_snapshot() {
            let target_is_on_peer = matches!(&target, Term::Pid(p) if p.node == peer);
            if target_is_on_peer {
                if let Some(watcher_mailbox) = inner.registry.mailbox(&watcher) {
                    watcher_mailbox.state.deliver(TransportMsg::new(MsgKind::MonitorExit, None, noconnection.clone()));
                }
                inner.registry.demonitor(&monitor_ref);
            }
        }
    }

    /// Shut the node down: every remote link/monitor fires `noconnection`,
    /// every remaining local link/monitor fires `reason`, then every
    /// mailbox closes and every connection drops.
    pub fn close(&self, reason: Term) {
        let mut inner = self.inner.lock().unwrap();
        let local_node = inner.local_node;
        let noconnection = Term::Atom(self.atoms.intern(b"noconnection").expect("noconnection interns"));
        let mailboxes: Vec<_> = inner.registry.all_mailboxes().cloned().collect();

        for mailbox_state in &mailboxes {
            let pid = mailbox_state.pid.clone();
            for linked in inner.registry.linked_to(&pid) {
                let exit_reason = if linked.node != local_node { noconnection.clone() } else { reason.clone() };
                mailbox_state.deliver(TransportMsg::new(MsgKind::Exit, Some(linked), exit_reason));
            }
            for (_, watcher, target) in inner.registry.monitors_snapshot() {
                if target == Term::Pid(pid.clone()) {
                    if let Some(watcher_mailbox) = inner.registry.mailbox(&watcher) {
                        let exit_reason = if watcher.node != local_node { noconnection.clone() } else { reason.clone() };
                        watcher_mailbox.state.deliver(TransportMsg::new(MsgKind::MonitorExit, Some(pid.clone()), exit_reason));
                    }
                }
            }
        }
        for mailbox_state in &mailboxes {
            mailbox_state.close();
        }
        inner.connections.clear();
    }
}
