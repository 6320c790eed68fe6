//! Framed transport for post-handshake distribution traffic.
//!
//! Generalizes `adapters_distribution::uds::UdsConnection`'s send/recv/tick
//! shape from raw Unix-domain-socket packets to the distribution protocol's
//! 4-byte-length-prefixed frames: a pass-through type byte, an ETF control
//! tuple, and (for ops that carry one) a trailing ETF payload term.

use std::collections::VecDeque;

use entities_atom::AtomTable;
use entities_term::Term;
use infrastructure_codec::{dec_term_int, enc_term_int, CodecFlags};

use crate::channel::{read_exact, Channel};
use crate::control::{carries_payload, decode_control, encode_control, ControlMessage};
use crate::error::TransportError;

/// Pass-through frame type byte every post-handshake data frame carries.
const FRAME_TYPE_PASS_THROUGH: u8 = 112;

/// Consecutive missed `net_tick/4` intervals before a connection is
/// considered dead.
const MAX_MISSED_TICKS: u32 = 4;

/// A connected peer's framed data channel: an outbound queue for
/// backpressure plus sent/received/ticked counters, mirroring the
/// statistics `UdsConnection::get_statistics` exposes.
pub struct FrameConnection {
    sent: u32,
    received: u32,
    ticked: u32,
    missed_ticks: u32,
    outbox: VecDeque<Vec<u8>>,
    outbox_capacity: usize,
}

impl FrameConnection {
    pub fn new(outbox_capacity: usize) -> Self {
        FrameConnection {
            sent: 0,
            received: 0,
            ticked: 0,
            missed_ticks: 0,
            outbox: VecDeque::new(),
            outbox_capacity,
        }
    }

    /// Queue a control message, and its payload if the opcode requires one,
    /// for sending. `Err(WouldBlock)` once the outbound queue is at
    /// capacity; the caller retries after the next successful `flush`.
    pub fn enqueue(
        &mut self,
        control: &ControlMessage,
        payload: Option<&Term>,
        atoms: &AtomTable,
        flags: CodecFlags,
    ) -> Result<(), TransportError> {
        if self.outbox.len() >= self.outbox_capacity {
            return Err(TransportError::WouldBlock);
        }
        let control_term = encode_control(control, atoms);
        let mut body = vec![FRAME_TYPE_PASS_THROUGH];
        enc_term_int(&mut body, &control_term, atoms, flags)?;
        if carries_payload(control) {
            let payload = payload
                .ok_or_else(|| TransportError::ProtocolError("control op requires a payload".into()))?;
            enc_term_int(&mut body, payload, atoms, flags)?;
        }
        self.outbox.push_back(body);
        Ok(())
    }

    /// Write every queued frame to `channel`, each prefixed with its 4-byte
    /// big-endian length.
    pub fn flush(&mut self, channel: &mut dyn Channel) -> Result<(), TransportError> {
        while let Some(body) = self.outbox.pop_front() {
            let mut framed = Vec::with_capacity(4 + body.len());
            framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
            framed.extend_from_slice(&body);
            channel.write_all(&framed)?;
            self.sent += 1;
        }
        Ok(())
    }

    /// Send an empty-length keepalive frame immediately, bypassing the
    /// outbound queue; ticks are never subject to backpressure.
    pub fn tick(&mut self, channel: &mut dyn Channel) -> Result<(), TransportError> {
        channel.write_all(&0u32.to_be_bytes())?;
        self.ticked += 1;
        Ok(())
    }

    /// Read one frame. `Ok(None)` for a zero-length tick frame; otherwise
    /// the decoded control tuple and, for ops that carry one, the payload
    /// term trailing it. Any successfully read frame counts as liveness
    /// and resets the missed-tick counter.
    pub fn recv(
        &mut self,
        channel: &mut dyn Channel,
        atoms: &AtomTable,
        flags: CodecFlags,
    ) -> Result<Option<(ControlMessage, Option<Term>)>, TransportError> {
        let header = read_exact(channel, 4)?;
        let length = u32::from_be_bytes(header.try_into().unwrap()) as usize;
        self.missed_ticks = 0;
        if length == 0 {
            return Ok(None);
        }
        let body = read_exact(channel, length)?;
        let &frame_type = body.first().ok_or(TransportError::Truncated)?;
        if frame_type != FRAME_TYPE_PASS_THROUGH {
            return Err(TransportError::ProtocolError(format!("unsupported frame type {frame_type}")));
        }
        let rest = &body[1..];
        let (control_term, consumed) = dec_term_int(rest, atoms, flags)?;
        let control = decode_control(&control_term)?;
        let payload = if carries_payload(&control) {
            let (payload_term, _) = dec_term_int(&rest[consumed..], atoms, flags)?;
            Some(payload_term)
        } else {
            None
        };
        self.received += 1;
        Ok(Some((control, payload)))
    }

    /// Call once per elapsed `net_tick/4` interval with no frame received
    /// since the last call. Returns `true` once `MAX_MISSED_TICKS`
    /// consecutive intervals have passed, meaning the caller should close
    /// the connection.
    pub fn note_interval_elapsed(&mut self) -> bool {
        self.missed_ticks += 1;
        self.missed_ticks >= MAX_MISSED_TICKS
    }

    pub fn get_statistics(&self) -> (u32, u32, u32) {
        (self.sent, self.received, self.ticked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_term::Pid;
    use std::collections::VecDeque as Deque;

    struct LoopbackChannel {
        inbound: Deque<u8>,
    }

    impl Channel for LoopbackChannel {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.inbound.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.inbound.pop_front().unwrap();
            }
            if n == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty"));
            }
            Ok(n)
        }

        fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
            self.inbound.extend(buf.iter().copied());
            Ok(())
        }
    }

    fn sample_pid(atoms: &AtomTable, id: u32) -> Pid {
        Pid { node: atoms.intern(b"a@host").unwrap(), id, serial: 0, creation: 1 }
    }

    #[test]
    fn link_frame_round_trips_with_no_payload() {
        let atoms = AtomTable::new();
        let flags = CodecFlags::default();
        let mut conn = FrameConnection::new(16);
        let mut channel = LoopbackChannel { inbound: Deque::new() };

        let msg = ControlMessage::Link { from: sample_pid(&atoms, 1), to: sample_pid(&atoms, 2) };
        conn.enqueue(&msg, None, &atoms, flags).unwrap();
        conn.flush(&mut channel).unwrap();

        let (decoded, payload) = conn.recv(&mut channel, &atoms, flags).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert!(payload.is_none());
        assert_eq!(conn.get_statistics(), (1, 1, 0));
    }

    #[test]
    fn reg_send_round_trips_with_a_payload() {
        let atoms = AtomTable::new();
        let flags = CodecFlags::default();
        let mut conn = FrameConnection::new(16);
        let mut channel = LoopbackChannel { inbound: Deque::new() };

        let msg = ControlMessage::RegSend {
            from: sample_pid(&atoms, 1),
            to_name: Term::Atom(atoms.intern(b"server").unwrap()),
        };
        let payload = Term::Small(42);
        conn.enqueue(&msg, Some(&payload), &atoms, flags).unwrap();
        conn.flush(&mut channel).unwrap();

        let (decoded, decoded_payload) = conn.recv(&mut channel, &atoms, flags).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded_payload, Some(payload));
    }

    #[test]
    fn send_without_a_payload_is_rejected_before_touching_the_wire() {
        let atoms = AtomTable::new();
        let flags = CodecFlags::default();
        let mut conn = FrameConnection::new(16);
        let msg = ControlMessage::Send { from: sample_pid(&atoms, 1), to: sample_pid(&atoms, 2) };
        assert!(conn.enqueue(&msg, None, &atoms, flags).is_err());
    }

    #[test]
    fn full_outbox_applies_backpressure() {
        let atoms = AtomTable::new();
        let flags = CodecFlags::default();
        let mut conn = FrameConnection::new(1);
        let msg = ControlMessage::Link { from: sample_pid(&atoms, 1), to: sample_pid(&atoms, 2) };
        conn.enqueue(&msg, None, &atoms, flags).unwrap();
        assert_eq!(conn.enqueue(&msg, None, &atoms, flags), Err(TransportError::WouldBlock));
    }

    #[test]
    fn zero_length_frame_is_a_tick_and_resets_missed_count() {
        let atoms = AtomTable::new();
        let flags = CodecFlags::default();
        let mut conn = FrameConnection::new(16);
        let mut channel = LoopbackChannel { inbound: Deque::new() };
        conn.tick(&mut channel).unwrap();
        conn.note_interval_elapsed();
        conn.note_interval_elapsed();

        let result = conn.recv(&mut channel, &atoms, flags).unwrap();
        assert!(result.is_none());
        assert_eq!(conn.get_statistics(), (0, 0, 1));
        assert!(!conn.note_interval_elapsed());
        assert!(!conn.note_interval_elapsed());
        assert!(!conn.note_interval_elapsed());
        assert!(conn.note_interval_elapsed());
    }
}
