//! A single process's incoming message queue.
//!
//! A node runs one mailbox per process with no async runtime underneath it,
//! so suspension is implemented with `std::sync::Condvar` instead of a
//! cooperative scheduler: a caller blocked in `receive` wakes either when
//! `Node::deliver` pushes a message or the timeout elapses.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use entities_atom::Atom;
use entities_pattern::{Bindings, Pattern};
use entities_term::Pid;

use crate::error::NodeError;
use crate::message::TransportMsg;

#[derive(Default)]
struct MailboxQueue {
    messages: VecDeque<TransportMsg>,
    closed: bool,
}

/// Shared state a `Mailbox` handle and the owning node's registry both
/// hold a reference to; dropping every `Mailbox` handle does not close it,
/// only `Mailbox::close` or `Node::close` does.
pub(crate) struct MailboxState {
    pub pid: Pid,
    pub name: Mutex<Option<Atom>>,
    queue: Mutex<MailboxQueue>,
    ready: Condvar,
}

impl MailboxState {
    pub fn new(pid: Pid, name: Option<Atom>) -> Arc<Self> {
        Arc::new(MailboxState {
            pid,
            name: Mutex::new(name),
            queue: Mutex::new(MailboxQueue::default()),
            ready: Condvar::new(),
        })
    }

    pub fn deliver(&self, msg: TransportMsg) {
        let mut queue = self.queue.lock().unwrap();
        if queue.closed {
            return;
        }
        queue.messages.push_back(msg);
        self.ready.notify_all();
    }

    pub fn close(&self) {
        let mut queue = self.queue.lock().unwrap();
        queue.closed = true;
        self.ready.notify_all();
    }
}

/// Handle to a mailbox. Cloning shares the same underlying queue.
#[derive(Clone)]
pub struct Mailbox {
    pub(crate) state: Arc<MailboxState>,
}

impl Mailbox {
    pub(crate) fn new(state: Arc<MailboxState>) -> Self {
        Mailbox { state }
    }

    pub fn pid(&self) -> Pid {
        self.state.pid.clone()
    }

    /// Block until a message arrives or `timeout` elapses.
    pub fn receive(&self, timeout: Duration) -> Result<TransportMsg, NodeError> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.state.queue.lock().unwrap();
        loop {
            if let Some(msg) = queue.messages.pop_front() {
                return Ok(msg);
            }
            if queue.closed {
                return Err(NodeError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(NodeError::Timeout);
            }
            let (guard, result) = self.state.ready.wait_timeout(queue, deadline - now).unwrap();
            queue = guard;
            if result.timed_out() && queue.messages.is_empty() && !queue.closed {
                return Err(NodeError::Timeout);
            }
        }
    }

    /// Scan the queue in arrival order for the first message whose payload
    /// matches `pattern`, removing only that message and leaving the rest.
    pub fn receive_match(&self, pattern: &Pattern, timeout: Duration) -> Result<(TransportMsg, Bindings), NodeError> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.state.queue.lock().unwrap();
        loop {
            let mut bindings = Bindings::new();
            let found = queue
                .messages
                .iter()
                .position(|msg| pattern.match_term(&msg.payload, &mut bindings));
            if let Some(index) = found {
                let msg = queue.messages.remove(index).expect("index came from this deque");
                return Ok((msg, bindings));
            }
            if queue.closed {
                return Err(NodeError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(NodeError::Timeout);
            }
            let (guard, _) = self.state.ready.wait_timeout(queue, deadline - now).unwrap();
            queue = guard;
        }
    }

    /// Close the mailbox, waking any waiter with `NodeError::Closed`.
    pub fn close(&self) {
        self.state.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_atom::AtomTable;
    use entities_term::Term;
    use std::thread;
    use std::time::Duration;

    fn sample_pid(atoms: &AtomTable, id: u32) -> Pid {
        Pid { node: atoms.intern(b"a@host").unwrap(), id, serial: 0, creation: 1 }
    }

    #[test]
    fn receive_returns_queued_message_immediately() {
        let atoms = AtomTable::new();
        let state = MailboxState::new(sample_pid(&atoms, 1), None);
        state.deliver(TransportMsg::new(crate::message::MsgKind::Send, None, Term::Small(1)));
        let mailbox = Mailbox::new(state);
        let msg = mailbox.receive(Duration::from_millis(50)).unwrap();
        assert_eq!(msg.payload, Term::Small(1));
    }

    #[test]
    fn receive_times_out_on_an_empty_queue() {
        let atoms = AtomTable::new();
        let mailbox = Mailbox::new(MailboxState::new(sample_pid(&atoms, 1), None));
        let result = mailbox.receive(Duration::from_millis(20));
        assert_eq!(result, Err(NodeError::Timeout));
    }

    #[test]
    fn receive_wakes_once_another_thread_delivers() {
        let atoms = AtomTable::new();
        let state = MailboxState::new(sample_pid(&atoms, 1), None);
        let mailbox = Mailbox::new(state.clone());
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            state.deliver(TransportMsg::new(crate::message::MsgKind::Send, None, Term::Small(7)));
        });
        let msg = mailbox.receive(Duration::from_secs(1)).unwrap();
        assert_eq!(msg.payload, Term::Small(7));
        handle.join().unwrap();
    }

    #[test]
    fn receive_match_skips_non_matching_messages_in_order() {
        let atoms = AtomTable::new();
        let state = MailboxState::new(sample_pid(&atoms, 1), None);
        state.deliver(TransportMsg::new(crate::message::MsgKind::Send, None, Term::Small(1)));
        state.deliver(TransportMsg::new(crate::message::MsgKind::Send, None, Term::Small(2)));
        let mailbox = Mailbox::new(state);

        let pattern = Pattern::Term(Term::Small(2));
        let (msg, _) = mailbox.receive_match(&pattern, Duration::from_millis(50)).unwrap();
        assert_eq!(msg.payload, Term::Small(2));

        // The first message is still queued, untouched.
        let remaining = mailbox.receive(Duration::from_millis(50)).unwrap();
        assert_eq!(remaining.payload, Term::Small(1));
    }

    #[test]
    fn closed_mailbox_wakes_waiters_with_closed() {
        let atoms = AtomTable::new();
        let mailbox = Mailbox::new(MailboxState::new(sample_pid(&atoms, 1), None));
        mailbox.close();
        let result = mailbox.receive(Duration::from_millis(50));
        assert_eq!(result, Err(NodeError::Closed));
    }
}
