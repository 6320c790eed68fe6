//! Distribution handshake: the byte exchange that turns a bare TCP
//! connection into an authenticated peer connection.
//!
//! An explicit state enum drives the exchange step by step rather than a
//! generic state-machine crate, with each step propagating its own error
//! through `TransportError`.

use std::fmt;

use rand::Rng;

use crate::channel::{read_exact, Channel};
use crate::error::TransportError;
use crate::flags::DistFlags;

const TAG_NAME: u8 = b'n';
const TAG_STATUS: u8 = b's';
const TAG_CHALLENGE_REPLY: u8 = b'r';
const TAG_CHALLENGE_ACK: u8 = b'a';
const HANDSHAKE_VERSION: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Disconnected,
    Connecting,
    HandshakeSendName,
    HandshakeRecvStatus,
    HandshakeRecvChallenge,
    HandshakeSendChallengeReply,
    HandshakeRecvChallengeAck,
    Connected,
    Closing,
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerStatus {
    Ok,
    OkSimultaneous,
    Nok,
    NotAllowed,
    Alive,
}

fn parse_status(text: &[u8]) -> Result<PeerStatus, TransportError> {
    match text {
        b"ok" => Ok(PeerStatus::Ok),
        b"ok_simultaneous" => Ok(PeerStatus::OkSimultaneous),
        b"nok" => Ok(PeerStatus::Nok),
        b"not_allowed" => Ok(PeerStatus::NotAllowed),
        b"alive" => Ok(PeerStatus::Alive),
        other => Err(TransportError::ProtocolError(format!(
            "unrecognized handshake status {:?}",
            String::from_utf8_lossy(other)
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    pub peer_name: String,
    pub peer_flags: DistFlags,
}

fn write_message(channel: &mut dyn Channel, body: &[u8]) -> Result<(), TransportError> {
    let len: u16 = body
        .len()
        .try_into()
        .map_err(|_| TransportError::ProtocolError("handshake message too long".into()))?;
    let mut framed = Vec::with_capacity(2 + body.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(body);
    channel.write_all(&framed)?;
    Ok(())
}

fn read_message(channel: &mut dyn Channel) -> Result<Vec<u8>, TransportError> {
    let len_bytes = read_exact(channel, 2)?;
    let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if len == 0 {
        return Ok(Vec::new());
    }
    Ok(read_exact(channel, len)?)
}

fn digest(cookie: &str, nonce: u32) -> [u8; 16] {
    let mut input = Vec::with_capacity(cookie.len() + 10);
    input.extend_from_slice(cookie.as_bytes());
    input.extend_from_slice(nonce.to_string().as_bytes());
    md5::compute(&input).0
}

/// Run the outbound (connecting) side of the handshake to completion over
/// `channel`, advancing through every named handshake state. Returns
/// the peer's node name and negotiated flags once `ChallengeAck` verifies,
/// or `TransportError::AuthFailed` if the digests disagree.
pub fn connect(
    channel: &mut dyn Channel,
    local_node: &str,
    cookie: &str,
    local_flags: DistFlags,
    state: &mut HandshakeState,
) -> Result<HandshakeOutcome, TransportError> {
    connect_with_nonce(channel, local_node, cookie, local_flags, rand::thread_rng().gen(), state)
}

/// Same as [`connect`] with the reply nonce supplied by the caller instead
/// of drawn from the system RNG, so tests can compute the expected ack
/// digest up front instead of round-tripping it out of a probe run.
fn connect_with_nonce(
    channel: &mut dyn Channel,
    local_node: &str,
    cookie: &str,
    local_flags: DistFlags,
    our_nonce: u32,
    state: &mut HandshakeState,
) -> Result<HandshakeOutcome, TransportError> {
    let outcome = run_steps(channel, local_node, cookie, local_flags, our_nonce, state);
    *state = if outcome.is_ok() { HandshakeState::Connected } else { HandshakeState::Failed };
    outcome
}

fn run_steps(
    channel: &mut dyn Channel,
    local_node: &str,
    cookie: &str,
    local_flags: DistFlags,
    our_nonce: u32,
    state: &mut HandshakeState,
) -> Result<HandshakeOutcome, TransportError> {
    *state = HandshakeState::HandshakeSendName;
    let mut name_body = vec![TAG_NAME];
    name_body.extend_from_slice(&HANDSHAKE_VERSION.to_be_bytes());
    name_body.extend_from_slice(&local_flags.bits().to_be_bytes());
    name_body.extend_from_slice(local_node.as_bytes());
    write_message(channel, &name_body)?;

    *state = HandshakeState::HandshakeRecvStatus;
    loop {
        let msg = read_message(channel)?;
        let (&tag, text) = msg.split_first().ok_or(TransportError::Truncated)?;
        if tag != TAG_STATUS {
            return Err(TransportError::ProtocolError(format!("expected status message, got tag {tag}")));
        }
        match parse_status(text)? {
            PeerStatus::Ok | PeerStatus::OkSimultaneous => break,
            PeerStatus::Alive => {
                write_message(channel, b"strue")?;
                continue;
            }
            PeerStatus::Nok | PeerStatus::NotAllowed => {
                return Err(TransportError::ProtocolError("peer rejected connection".into()));
            }
        }
    }

    *state = HandshakeState::HandshakeRecvChallenge;
    let challenge_msg = read_message(channel)?;
    let (&tag, rest) = challenge_msg.split_first().ok_or(TransportError::Truncated)?;
    if tag != TAG_NAME || rest.len() < 10 {
        return Err(TransportError::ProtocolError("malformed challenge message".into()));
    }
    let peer_flags = DistFlags::from_bits(u32::from_be_bytes([rest[2], rest[3], rest[4], rest[5]]));
    let peer_nonce = u32::from_be_bytes([rest[6], rest[7], rest[8], rest[9]]);
    let peer_name = String::from_utf8_lossy(&rest[10..]).into_owned();

    *state = HandshakeState::HandshakeSendChallengeReply;
    let mut reply_body = vec![TAG_CHALLENGE_REPLY];
    reply_body.extend_from_slice(&our_nonce.to_be_bytes());
    reply_body.extend_from_slice(&digest(cookie, peer_nonce));
    write_message(channel, &reply_body)?;

    *state = HandshakeState::HandshakeRecvChallengeAck;
    let ack_msg = read_message(channel)?;
    let (&tag, ack_digest) = ack_msg.split_first().ok_or(TransportError::Truncated)?;
    if tag != TAG_CHALLENGE_ACK || ack_digest.len() != 16 {
        return Err(TransportError::ProtocolError("malformed challenge ack".into()));
    }
    if ack_digest != digest(cookie, our_nonce) {
        return Err(TransportError::AuthFailed);
    }

    Ok(HandshakeOutcome { peer_name, peer_flags })
}

/// Run the inbound (accepting) side of the handshake to completion over a
/// freshly accepted `channel`. Mirrors [`connect`]'s sequence with the
/// roles reversed: read the peer's name first, reply `ok`, issue our own
/// challenge, then verify the peer's reply before acking it.
///
/// Conflict resolution (`ok_simultaneous`/`nok`/`not_allowed` on the
/// accepting side, for a peer already connected or disallowed) is out of
/// scope here; every accepted name is answered with a plain `ok`.
pub fn accept(
    channel: &mut dyn Channel,
    local_node: &str,
    cookie: &str,
    local_flags: DistFlags,
    state: &mut HandshakeState,
) -> Result<HandshakeOutcome, TransportError> {
    accept_with_nonce(channel, local_node, cookie, local_flags, rand::thread_rng().gen(), state)
}

fn accept_with_nonce(
    channel: &mut dyn Channel,
    local_node: &str,
    cookie: &str,
    local_flags: DistFlags,
    our_nonce: u32,
    state: &mut HandshakeState,
) -> Result<HandshakeOutcome, TransportError> {
    let outcome = accept_steps(channel, local_node, cookie, local_flags, our_nonce, state);
    *state = if outcome.is_ok() { HandshakeState::Connected } else { HandshakeState::Failed };
    outcome
}

fn accept_steps(
    channel: &mut dyn Channel,
    local_node: &str,
    cookie: &str,
    local_flags: DistFlags,
    our_nonce: u32,
    state: &mut HandshakeState,
) -> Result<HandshakeOutcome, TransportError> {
    *state = HandshakeState::HandshakeRecvStatus;
    let name_msg = read_message(channel)?;
    let (&tag, rest) = name_msg.split_first().ok_or(TransportError::Truncated)?;
    if tag != TAG_NAME || rest.len() < 6 {
        return Err(TransportError::ProtocolError("malformed send_name message".into()));
    }
    let peer_flags = DistFlags::from_bits(u32::from_be_bytes([rest[2], rest[3], rest[4], rest[5]]));
    let peer_name = String::from_utf8_lossy(&rest[6..]).into_owned();

    *state = HandshakeState::HandshakeSendName;
    write_message(channel, b"sok")?;

    *state = HandshakeState::HandshakeSendChallengeReply;
    let mut challenge_body = vec![TAG_NAME];
    challenge_body.extend_from_slice(&HANDSHAKE_VERSION.to_be_bytes());
    challenge_body.extend_from_slice(&local_flags.bits().to_be_bytes());
    challenge_body.extend_from_slice(&our_nonce.to_be_bytes());
    challenge_body.extend_from_slice(local_node.as_bytes());
    write_message(channel, &challenge_body)?;

    *state = HandshakeState::HandshakeRecvChallengeAck;
    let reply_msg = read_message(channel)?;
    let (&tag, reply_rest) = reply_msg.split_first().ok_or(TransportError::Truncated)?;
    if tag != TAG_CHALLENGE_REPLY || reply_rest.len() != 20 {
        return Err(TransportError::ProtocolError("malformed challenge reply".into()));
    }
    let peer_nonce = u32::from_be_bytes([reply_rest[0], reply_rest[1], reply_rest[2], reply_rest[3]]);
    if &reply_rest[4..] != digest(cookie, our_nonce) {
        return Err(TransportError::AuthFailed);
    }

    let mut ack_body = vec![TAG_CHALLENGE_ACK];
    ack_body.extend_from_slice(&digest(cookie, peer_nonce));
    write_message(channel, &ack_body)?;

    Ok(HandshakeOutcome { peer_name, peer_flags })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use std::collections::VecDeque;

    /// Feeds a scripted byte sequence for reads and records everything
    /// written, so a full handshake can be replayed deterministically.
    struct ScriptedChannel {
        inbound: VecDeque<u8>,
        pub outbound: Vec<u8>,
    }

    impl ScriptedChannel {
        fn new(inbound: Vec<u8>) -> Self {
            ScriptedChannel { inbound: inbound.into(), outbound: Vec::new() }
        }
    }

    impl Channel for ScriptedChannel {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.inbound.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }

        fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
            self.outbound.extend_from_slice(buf);
            Ok(())
        }
    }

    fn status_message(text: &[u8]) -> Vec<u8> {
        let mut body = vec![TAG_STATUS];
        body.extend_from_slice(text);
        let mut msg = (body.len() as u16).to_be_bytes().to_vec();
        msg.extend_from_slice(&body);
        msg
    }

    fn challenge_message(flags: DistFlags, nonce: u32, name: &str) -> Vec<u8> {
        let mut body = vec![TAG_NAME];
        body.extend_from_slice(&HANDSHAKE_VERSION.to_be_bytes());
        body.extend_from_slice(&flags.bits().to_be_bytes());
        body.extend_from_slice(&nonce.to_be_bytes());
        body.extend_from_slice(name.as_bytes());
        let mut msg = (body.len() as u16).to_be_bytes().to_vec();
        msg.extend_from_slice(&body);
        msg
    }

    fn ack_message(cookie: &str, our_nonce: u32) -> Vec<u8> {
        let mut body = vec![TAG_CHALLENGE_ACK];
        body.extend_from_slice(&digest(cookie, our_nonce));
        let mut msg = (body.len() as u16).to_be_bytes().to_vec();
        msg.extend_from_slice(&body);
        msg
    }

    #[test]
    fn matching_cookies_reach_connected() {
        let cookie = "secret";
        let peer_nonce = 0xCAFEBABEu32;
        let our_nonce = 0x1234_5678u32;
        let mut script = Vec::new();
        script.extend(status_message(b"ok"));
        script.extend(challenge_message(DistFlags::required(), peer_nonce, "peer@host"));
        script.extend(ack_message(cookie, our_nonce));

        let mut channel = ScriptedChannel::new(script);
        let mut state = HandshakeState::Disconnected;
        let outcome = connect_with_nonce(&mut channel, "local@host", cookie, DistFlags::required(), our_nonce, &mut state).unwrap();
        assert_eq!(outcome.peer_name, "peer@host");
        assert_eq!(outcome.peer_flags, DistFlags::required());
        assert_eq!(state, HandshakeState::Connected);

        let reply_offset = channel.outbound.len() - (2 + 1 + 4 + 16);
        let reply = &channel.outbound[reply_offset..];
        assert_eq!(reply[2], TAG_CHALLENGE_REPLY);
        assert_eq!(u32::from_be_bytes([reply[3], reply[4], reply[5], reply[6]]), our_nonce);
        assert_eq!(&reply[7..], &digest(cookie, peer_nonce));
    }

    #[test]
    fn mismatched_cookie_in_ack_is_auth_failed() {
        let mut script = Vec::new();
        script.extend(status_message(b"ok"));
        script.extend(challenge_message(DistFlags::required(), 42, "peer@host"));
        script.extend(ack_message("wrong-cookie", 0));
        let mut channel = ScriptedChannel::new(script);
        let mut state = HandshakeState::Disconnected;
        let result = connect(&mut channel, "local@host", "secret", DistFlags::required(), &mut state);
        assert_eq!(result, Err(TransportError::AuthFailed));
        assert_eq!(state, HandshakeState::Failed);
    }

    #[test]
    fn rejection_status_is_a_protocol_error() {
        let mut channel = ScriptedChannel::new(status_message(b"nok"));
        let mut state = HandshakeState::Disconnected;
        let result = connect(&mut channel, "local@host", "secret", DistFlags::required(), &mut state);
        assert!(matches!(result, Err(TransportError::ProtocolError(_))));
        assert_eq!(state, HandshakeState::Failed);
    }

    #[test]
    fn connect_and_accept_reach_connected_over_a_real_socket_pair() {
        use std::net::TcpListener;
        use std::thread;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut state = HandshakeState::Disconnected;
            accept(&mut stream, "server@host", "secret", DistFlags::required(), &mut state).unwrap()
        });

        let mut client = std::net::TcpStream::connect(addr).unwrap();
        let mut state = HandshakeState::Disconnected;
        let client_outcome = connect(&mut client, "client@host", "secret", DistFlags::required(), &mut state).unwrap();
        let server_outcome = server.join().unwrap();

        assert_eq!(client_outcome.peer_name, "server@host");
        assert_eq!(server_outcome.peer_name, "client@host");
        assert_eq!(state, HandshakeState::Connected);
    }

    #[test]
    fn accept_rejects_a_mismatched_cookie() {
        let mut script = Vec::new();
        let mut name_body = vec![TAG_NAME];
        name_body.extend_from_slice(&HANDSHAKE_VERSION.to_be_bytes());
        name_body.extend_from_slice(&DistFlags::required().bits().to_be_bytes());
        name_body.extend_from_slice(b"peer@host");
        let mut name_msg = (name_body.len() as u16).to_be_bytes().to_vec();
        name_msg.extend_from_slice(&name_body);
        script.extend(name_msg);

        let mut reply_body = vec![TAG_CHALLENGE_REPLY];
        reply_body.extend_from_slice(&99u32.to_be_bytes());
        reply_body.extend_from_slice(&digest("wrong-cookie", 7));
        let mut reply_msg = (reply_body.len() as u16).to_be_bytes().to_vec();
        reply_msg.extend_from_slice(&reply_body);
        script.extend(reply_msg);

        let mut channel = ScriptedChannel::new(script);
        let mut state = HandshakeState::Disconnected;
        let result = accept_with_nonce(&mut channel, "local@host", "secret", DistFlags::required(), 7, &mut state);
        assert_eq!(result, Err(TransportError::AuthFailed));
        assert_eq!(state, HandshakeState::Failed);
    }

    #[test]
    fn mock_channel_can_stand_in_for_a_live_socket() {
        let mut mock = MockChannel::new();
        mock.expect_write_all().returning(|_| Ok(()));
        mock.expect_read().returning(|buf| {
            buf.fill(0);
            Ok(buf.len())
        });
        // Feeding zeros never forms a valid status message; this just
        // proves mockall wiring compiles and drives the same trait object
        // the live TcpStream path uses.
        let mut state = HandshakeState::Disconnected;
        let result = connect(&mut mock, "local@host", "secret", DistFlags::required(), &mut state);
        assert!(result.is_err());
    }
}
