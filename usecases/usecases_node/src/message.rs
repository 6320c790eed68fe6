//! The message shape delivered into a mailbox's queue.

use entities_term::{Pid, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Send,
    RegSend,
    Link,
    Unlink,
    Exit,
    Exit2,
    Monitor,
    Demonitor,
    MonitorExit,
}

/// `(kind, sender, payload)` — what a mailbox's `receive` hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportMsg {
    pub kind: MsgKind,
    pub sender: Option<Pid>,
    pub payload: Term,
}

impl TransportMsg {
    pub fn new(kind: MsgKind, sender: Option<Pid>, payload: Term) -> Self {
        TransportMsg { kind, sender, payload }
    }
}
