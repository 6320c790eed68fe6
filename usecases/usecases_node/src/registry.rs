//! Local mailbox registry, name table, and link/monitor tables.
//!
//! One registry of addressable entities per node: pid/ref allocation, name
//! binding, and the per-node link and monitor tables, kept in a single
//! table the node locks rather than split across a scheduler's process
//! table.

use std::collections::{HashMap, HashSet};

use entities_atom::Atom;
use entities_term::{Pid, Reference, Term};

use crate::error::NodeError;
use crate::mailbox::{Mailbox, MailboxState};

/// Allocates `pid`/`ref` ids for one node: `id` increments monotonically,
/// `serial` rolls over at 2^15, matching the field's wire width.
pub(crate) struct IdAllocator {
    next_id: u32,
    next_serial: u32,
    next_ref_id: u32,
    node: Atom,
    creation: u32,
}

const SERIAL_ROLLOVER: u32 = 1 << 15;

impl IdAllocator {
    pub fn new(node: Atom, creation: u32) -> Self {
        IdAllocator { next_id: 0, next_serial: 0, next_ref_id: 1, node, creation }
    }

    pub fn next_pid(&mut self) -> Pid {
        let id = self.next_id;
        let serial = self.next_serial;
        self.next_id = self.next_id.wrapping_add(1);
        self.next_serial = (self.next_serial + 1) % SERIAL_ROLLOVER;
        Pid { node: self.node, id, serial, creation: self.creation }
    }

    pub fn next_ref(&mut self) -> Reference {
        let id = self.next_ref_id;
        self.next_ref_id = self.next_ref_id.wrapping_add(1);
        Reference { node: self.node, ids: vec![id, 0, 0], creation: self.creation }
    }
}

/// Registry of local mailboxes, the name table, and link/monitor tables.
/// Not `Send`/`Sync` by itself; `Node` is the thing that serializes access.
#[derive(Default)]
pub(crate) struct Registry {
    mailboxes: HashMap<Pid, std::sync::Arc<MailboxState>>,
    names: HashMap<Atom, Pid>,
    links: HashSet<(Pid, Pid)>,
    monitors: HashMap<Reference, (Pid, Term)>,
}

fn pid_sort_key(pid: &Pid) -> (u32, u32, u32, u32) {
    (pid.node.index(), pid.id, pid.serial, pid.creation)
}

fn link_key(a: &Pid, b: &Pid) -> (Pid, Pid) {
    // Order-independent key so `link(a, b)` and `link(b, a)` dedupe.
    if pid_sort_key(a) <= pid_sort_key(b) {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl Registry {
    pub fn insert_mailbox(&mut self, state: std::sync::Arc<MailboxState>) {
        self.mailboxes.insert(state.pid.clone(), state);
    }

    pub fn mailbox(&self, pid: &Pid) -> Option<Mailbox> {
        self.mailboxes.get(pid).cloned().map(Mailbox::new)
    }

    pub fn remove_mailbox(&mut self, pid: &Pid) -> Option<std::sync::Arc<MailboxState>> {
        self.names.retain(|_, bound_pid| bound_pid != pid);
        self.links.retain(|(a, b)| a != pid && b != pid);
        self.mailboxes.remove(pid)
    }

    pub fn all_mailboxes(&self) -> impl Iterator<Item = &std::sync::Arc<MailboxState>> {
        self.mailboxes.values()
    }

    pub fn register(&mut self, name: Atom, pid: Pid) -> Result<(), NodeError> {
        if self.names.contains_key(&name) {
            return Err(NodeError::NameInUse);
        }
        self.names.insert(name, pid);
        Ok(())
    }

    pub fn unregister(&mut self, name: Atom) {
        self.names.remove(&name);
    }

    pub fn whereis(&self, name: Atom) -> Option<Pid> {
        self.names.get(&name).cloned()
    }

    pub fn link(&mut self, a: Pid, b: Pid) {
        self.links.insert(link_key(&a, &b));
    }

    pub fn unlink(&mut self, a: Pid, b: Pid) {
        self.links.remove(&link_key(&a, &b));
    }

    pub fn linked_to(&self, pid: &Pid) -> Vec<Pid> {
        self.links
            .iter()
            .filter_map(|(a, b)| {
                if a == pid {
                    Some(b.clone())
                } else if b == pid {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn monitor(&mut self, monitor_ref: Reference, watcher: Pid, target: Term) {
        self.monitors.insert(monitor_ref, (watcher, target));
    }

    pub fn demonitor(&mut self, monitor_ref: &Reference) -> Option<(Pid, Term)> {
        self.monitors.remove(monitor_ref)
    }

    pub fn monitors_targeting(&self, target: &Term) -> Vec<(Reference, Pid)> {
        self.monitors
            .iter()
            .filter(|(_, (_, t))| t == target)
            .map(|(r, (watcher, _))| (r.clone(), watcher.clone()))
            .collect()
    }

    /// Every outstanding `(ref, watcher, target)` triple, for a node-wide
    /// sweep (connection loss, shutdown) rather than a single-target lookup.
    pub fn monitors_snapshot(&self) -> Vec<(Reference, Pid, Term)> {
        self.monitors.iter().map(|(r, (watcher, target))| (r.clone(), watcher.clone(), target.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_atom::AtomTable;

    fn node_atom(atoms: &AtomTable) -> Atom {
        atoms.intern(b"a@host").unwrap()
    }

    #[test]
    fn pid_allocation_increments_id_and_serial() {
        let atoms = AtomTable::new();
        let mut alloc = IdAllocator::new(node_atom(&atoms), 1);
        let first = alloc.next_pid();
        let second = alloc.next_pid();
        assert_eq!(first.id, 0);
        assert_eq!(second.id, 1);
        assert_eq!(second.serial, 1);
    }

    #[test]
    fn register_rejects_a_name_already_bound() {
        let atoms = AtomTable::new();
        let node = node_atom(&atoms);
        let mut registry = Registry::default();
        let pid_a = Pid { node, id: 1, serial: 0, creation: 1 };
        let pid_b = Pid { node, id: 2, serial: 0, creation: 1 };
        let name = atoms.intern(b"server").unwrap();

        assert!(registry.register(name, pid_a.clone()).is_ok());
        assert_eq!(registry.register(name, pid_b), Err(NodeError::NameInUse));
        assert_eq!(registry.whereis(name), Some(pid_a));
    }

    #[test]
    fn link_is_symmetric_and_idempotent() {
        let atoms = AtomTable::new();
        let node = node_atom(&atoms);
        let mut registry = Registry::default();
        let pid_a = Pid { node, id: 1, serial: 0, creation: 1 };
        let pid_b = Pid { node, id: 2, serial: 0, creation: 1 };

        registry.link(pid_a.clone(), pid_b.clone());
        registry.link(pid_b.clone(), pid_a.clone());
        assert_eq!(registry.linked_to(&pid_a), vec![pid_b.clone()]);
        assert_eq!(registry.linked_to(&pid_b), vec![pid_a.clone()]);

        registry.unlink(pid_a.clone(), pid_b.clone());
        assert!(registry.linked_to(&pid_a).is_empty());
    }

    #[test]
    fn unlinking_a_nonexistent_link_is_a_no_op() {
        let atoms = AtomTable::new();
        let node = node_atom(&atoms);
        let mut registry = Registry::default();
        let pid_a = Pid { node, id: 1, serial: 0, creation: 1 };
        let pid_b = Pid { node, id: 2, serial: 0, creation: 1 };
        registry.unlink(pid_a, pid_b);
    }

    #[test]
    fn monitors_targeting_finds_watchers_by_target() {
        let atoms = AtomTable::new();
        let node = node_atom(&atoms);
        let mut registry = Registry::default();
        let watcher = Pid { node, id: 1, serial: 0, creation: 1 };
        let target = Term::Atom(atoms.intern(b"server").unwrap());
        let mut alloc = IdAllocator::new(node, 1);
        let monitor_ref = alloc.next_ref();

        registry.monitor(monitor_ref.clone(), watcher.clone(), target.clone());
        let found = registry.monitors_targeting(&target);
        assert_eq!(found, vec![(monitor_ref.clone(), watcher)]);
        assert_eq!(registry.demonitor(&monitor_ref), Some((Pid { node, id: 1, serial: 0, creation: 1 }, target)));
        assert!(registry.monitors_targeting(&Term::Atom(atoms.intern(b"server").unwrap())).is_empty());
    }
}
