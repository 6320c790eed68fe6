//! Post-handshake control message tuples.
//!
//! Every distribution operation is an ETF tuple whose first element is an
//! integer discriminant; this crate round-trips the nine control ops a
//! connected peer can send. The unused `_` slot several ops carry (a
//! holdover from the
//! protocol's cookie field) is encoded as the empty atom, matching how real
//! peers fill it once distribution cookies stopped being sent on the wire.

use entities_atom::AtomTable;
use entities_term::{Pid, Reference, Term};

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    Link { from: Pid, to: Pid },
    Send { from: Pid, to: Pid },
    Exit { from: Pid, to: Pid, reason: Term },
    Unlink { from: Pid, to: Pid },
    RegSend { from: Pid, to_name: Term },
    Exit2 { from: Pid, to: Pid, reason: Term },
    Monitor { from: Pid, to: Term, monitor_ref: Reference },
    Demonitor { from: Pid, to: Term, monitor_ref: Reference },
    MonitorExit { from: Pid, to: Pid, monitor_ref: Reference, reason: Term },
}

const OP_LINK: i64 = 1;
const OP_SEND: i64 = 2;
const OP_EXIT: i64 = 3;
const OP_UNLINK: i64 = 4;
const OP_REG_SEND: i64 = 6;
const OP_EXIT2: i64 = 8;
const OP_MONITOR: i64 = 19;
const OP_DEMONITOR: i64 = 20;
const OP_MONITOR_EXIT: i64 = 21;

fn unused_slot(atoms: &AtomTable) -> Term {
    Term::Atom(atoms.intern(b"").expect("empty atom always interns"))
}

/// `true` if this op carries a payload term after the control tuple.
pub fn carries_payload(msg: &ControlMessage) -> bool {
    matches!(msg, ControlMessage::Send { .. } | ControlMessage::RegSend { .. })
}

pub fn encode_control(msg: &ControlMessage, atoms: &AtomTable) -> Term {
    match msg {
        ControlMessage::Link { from, to } => {
            Term::Tuple(vec![Term::Small(OP_LINK), Term::Pid(from.clone()), unused_slot(atoms), Term::Pid(to.clone())])
        }
        ControlMessage::Send { from, to } => {
            Term::Tuple(vec![Term::Small(OP_SEND), Term::Pid(from.clone()), Term::Pid(to.clone())])
        }
        ControlMessage::Exit { from, to, reason } => Term::Tuple(vec![
            Term::Small(OP_EXIT),
            Term::Pid(from.clone()),
            unused_slot(atoms),
            Term::Pid(to.clone()),
            reason.clone(),
        ]),
        ControlMessage::Unlink { from, to } => {
            Term::Tuple(vec![Term::Small(OP_UNLINK), Term::Pid(from.clone()), unused_slot(atoms), Term::Pid(to.clone())])
        }
        ControlMessage::RegSend { from, to_name } => Term::Tuple(vec![
            Term::Small(OP_REG_SEND),
            Term::Pid(from.clone()),
            unused_slot(atoms),
            to_name.clone(),
        ]),
        ControlMessage::Exit2 { from, to, reason } => Term::Tuple(vec![
            Term::Small(OP_EXIT2),
            Term::Pid(from.clone()),
            unused_slot(atoms),
            Term::Pid(to.clone()),
            reason.clone(),
        ]),
        ControlMessage::Monitor { from, to, monitor_ref } => {
            Term::Tuple(vec![Term::Small(OP_MONITOR), Term::Pid(from.clone()), to.clone(), Term::Ref(monitor_ref.clone())])
        }
        ControlMessage::Demonitor { from, to, monitor_ref } => {
            Term::Tuple(vec![Term::Small(OP_DEMONITOR), Term::Pid(from.clone()), to.clone(), Term::Ref(monitor_ref.clone())])
        }
        ControlMessage::MonitorExit { from, to, monitor_ref, reason } => Term::Tuple(vec![
            Term::Small(OP_MONITOR_EXIT),
            Term::Pid(from.clone()),
            Term::Pid(to.clone()),
            Term::Ref(monitor_ref.clone()),
            reason.clone(),
        ]),
    }
}

fn expect_pid(term: &Term) -> Result<Pid, TransportError> {
    match term {
        Term::Pid(pid) => Ok(pid.clone()),
        other => Err(TransportError::ProtocolError(format!("expected pid, got {other:?}"))),
    }
}

fn expect_ref(term: &Term) -> Result<Reference, TransportError> {
    match term {
        Term::Ref(reference) => Ok(reference.clone()),
        other => Err(TransportError::ProtocolError(format!("expected ref, got {other:?}"))),
    }
}

fn expect_op(term: &Term) -> Result<i64, TransportError> {
    match term {
        Term::Small(n) => Ok(*n),
        other => Err(TransportError::ProtocolError(format!("expected control opcode, got {other:?}"))),
    }
}

pub fn decode_control(term: &Term) -> Result<ControlMessage, TransportError> {
    let Term::Tuple(elements) = term else {
        return Err(TransportError::ProtocolError("control message is not a tuple".into()));
    };
    let op = elements.first().ok_or(TransportError::Truncated).and_then(expect_op)?;
    match (op, elements.as_slice()) {
        (OP_LINK, [_, from, _, to]) => Ok(ControlMessage::Link { from: expect_pid(from)?, to: expect_pid(to)? }),
        (OP_SEND, [_, from, to]) => Ok(ControlMessage::Send { from: expect_pid(from)?, to: expect_pid(to)? }),
        (OP_EXIT, [_, from, _, to, reason]) => {
            Ok(ControlMessage::Exit { from: expect_pid(from)?, to: expect_pid(to)?, reason: reason.clone() })
        }
        (OP_UNLINK, [_, from, _, to]) => Ok(ControlMessage::Unlink { from: expect_pid(from)?, to: expect_pid(to)? }),
        (OP_REG_SEND, [_, from, _, to_name]) => {
            Ok(ControlMessage::RegSend { from: expect_pid(from)?, to_name: to_name.clone() })
        }
        (OP_EXIT2, [_, from, _, to, reason]) => {
            Ok(ControlMessage::Exit2 { from: expect_pid(from)?, to: expect_pid(to)?, reason: reason.clone() })
        }
        (OP_MONITOR, [_, from, to, monitor_ref]) => {
            Ok(ControlMessage::Monitor { from: expect_pid(from)?, to: to.clone(), monitor_ref: expect_ref(monitor_ref)? })
        }
        (OP_DEMONITOR, [_, from, to, monitor_ref]) => {
            Ok(ControlMessage::Demonitor { from: expect_pid(from)?, to: to.clone(), monitor_ref: expect_ref(monitor_ref)? })
        }
        (OP_MONITOR_EXIT, [_, from, to, monitor_ref, reason]) => Ok(ControlMessage::MonitorExit {
            from: expect_pid(from)?,
            to: expect_pid(to)?,
            monitor_ref: expect_ref(monitor_ref)?,
            reason: reason.clone(),
        }),
        (op, _) => Err(TransportError::ProtocolError(format!("unrecognized or malformed control op {op}"))),
    }
}
