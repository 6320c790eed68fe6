//! A live connection to one remote node: the TCP stream plus its framed
//! control-message transport, established on demand by `Node::send` and
//! torn down on I/O failure or explicit close.

use std::net::{TcpStream, ToSocketAddrs};

use adapters_transport::{accept, connect, ControlMessage, DistFlags, FrameConnection, HandshakeState};
use entities_atom::{Atom, AtomTable};
use entities_term::Term;
use infrastructure_codec::CodecFlags;

use crate::error::NodeError;

const OUTBOUND_QUEUE_CAPACITY: usize = 256;

pub(crate) struct Connection {
    pub peer: Atom,
    stream: TcpStream,
    frame: FrameConnection,
}

fn resolve(host: &str, port: u16) -> Result<std::net::SocketAddr, NodeError> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| NodeError::TransportError(format!("{host}:{port} did not resolve to an address")))
}

impl Connection {
    /// Resolve `peer`'s distribution port via EPMD, connect, and run the
    /// initiating side of the handshake. `peer_host` is the connectable
    /// host/IP the caller supplies; no DNS lookup happens beyond what
    /// `ToSocketAddrs` itself performs.
    pub fn establish(
        peer: Atom,
        peer_node_name: &str,
        peer_host: &str,
        epmd_port: u16,
        local_node: &str,
        cookie: &str,
    ) -> Result<Connection, NodeError> {
        let epmd_addr = resolve(peer_host, epmd_port)?;
        let port_info = adapters_epmd::port_please(epmd_addr, peer_node_name)?;

        let mut stream = TcpStream::connect(resolve(peer_host, port_info.port)?)?;

        let mut state = HandshakeState::Disconnected;
        connect(&mut stream, local_node, cookie, DistFlags::required(), &mut state)?;

        Ok(Connection { peer, stream, frame: FrameConnection::new(OUTBOUND_QUEUE_CAPACITY) })
    }

    /// Run the accepting side of the handshake over an already-accepted
    /// `stream`. `peer` is filled in once the peer's node name is known;
    /// the caller looks it up in the atom table and re-keys its connection
    /// map accordingly.
    pub fn accept(stream: TcpStream, local_node: &str, cookie: &str, atoms: &AtomTable) -> Result<Connection, NodeError> {
        let mut stream = stream;
        let mut state = HandshakeState::Disconnected;
        let outcome = accept(&mut stream, local_node, cookie, DistFlags::required(), &mut state)?;
        let peer = atoms
            .intern(outcome.peer_name.as_bytes())
            .map_err(|_| NodeError::ProtocolError("peer node name is not a valid atom".into()))?;
        Ok(Connection { peer, stream, frame: FrameConnection::new(OUTBOUND_QUEUE_CAPACITY) })
    }

    pub fn send_control(
        &mut self,
        control: &ControlMessage,
        payload: Option<&Term>,
        atoms: &AtomTable,
    ) -> Result<(), NodeError> {
        self.frame.enqueue(control, payload, atoms, CodecFlags::default())?;
        self.frame.flush(&mut self.stream)?;
        Ok(())
    }

    pub fn recv_control(
        &mut self,
        atoms: &AtomTable,
    ) -> Result<Option<(ControlMessage, Option<Term>)>, NodeError> {
        Ok(self.frame.recv(&mut self.stream, atoms, CodecFlags::default())?)
    }

    pub fn tick(&mut self) -> Result<(), NodeError> {
        Ok(self.frame.tick(&mut self.stream)?)
    }
}
