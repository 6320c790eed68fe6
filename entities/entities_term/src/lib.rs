//! Entities Layer: Term Model
//!
//! `Term` is the in-memory representation every other crate in this
//! workspace passes around: the codec decodes bytes into a `Term`, the
//! matcher walks a `Term` against a pattern, the node runtime carries a
//! `Term` as a message payload. A `Term` is immutable once built and owns
//! its substructure, so it is safe to move a `Term` into a mailbox without
//! worrying about who else might mutate it.
//!
//! Pids, ports and refs carry a `node` atom rather than a node handle: this
//! crate has no notion of a live connection, only of the wire-level value.

use entities_atom::Atom;
use malachite::Integer;
use std::cmp::Ordering;

/// A process identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pid {
    pub node: Atom,
    pub id: u32,
    pub serial: u32,
    pub creation: u32,
}

/// A port identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Port {
    pub node: Atom,
    pub id: u64,
    pub creation: u32,
}

/// An opaque reference, unique cluster-wide for its lifetime.
///
/// `ids` holds one to five 32-bit words depending on the wire form that
/// produced it; comparisons and hashing treat two refs with different word
/// counts as unequal even if the non-zero prefix matches, matching how the
/// VM never actually produces two differently-shaped refs for the same
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub node: Atom,
    pub ids: Vec<u32>,
    pub creation: u32,
}

/// A bitstring: `data` holds the bytes, `bit_size` the number of
/// significant bits. A byte-aligned binary has `bit_size == data.len() * 8`;
/// anything smaller is a bit-aligned binary (`BIT_BINARY_EXT` on the wire)
/// and only the low `bit_size % 8` bits of the final byte are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bitstring {
    pub data: Vec<u8>,
    pub bit_size: usize,
}

impl Bitstring {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let bit_size = data.len() * 8;
        Bitstring { data, bit_size }
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bit_size % 8 == 0 && self.bit_size == self.data.len() * 8
    }
}

/// The value model. See the module doc for the ownership story.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// The empty list, `[]`.
    Nil,
    /// A machine-word integer.
    Small(i64),
    /// An arbitrary-precision integer outside the `Small` range.
    Big(Integer),
    /// An IEEE 754 double.
    Float(f64),
    Atom(Atom),
    /// A bitstring/binary.
    Binary(Bitstring),
    /// The `STRING_EXT` wire optimization for a list of byte-sized
    /// non-negative integers: semantically identical to
    /// `List { elements: data as Small, tail: None }` but kept distinct so
    /// the codec can round-trip the compact wire form a peer actually sent.
    String(Vec<u8>),
    /// A list. `tail` is `None` for a proper list, `Some` for an improper
    /// one (`[1, 2 | 3]`).
    List {
        elements: Vec<Term>,
        tail: Option<Box<Term>>,
    },
    Tuple(Vec<Term>),
    /// Key/value pairs in encounter order. Lookup is linear, matching how
    /// these are always small in distribution traffic (flags, options).
    Map(Vec<(Term, Term)>),
    Pid(Pid),
    Port(Port),
    Ref(Reference),
}

impl Term {
    pub fn atom(atom: Atom) -> Term {
        Term::Atom(atom)
    }

    pub fn small(value: i64) -> Term {
        Term::Small(value)
    }

    pub fn binary(data: Vec<u8>) -> Term {
        Term::Binary(Bitstring::from_bytes(data))
    }

    pub fn proper_list(elements: Vec<Term>) -> Term {
        if elements.is_empty() {
            Term::Nil
        } else {
            Term::List { elements, tail: None }
        }
    }

    pub fn improper_list(elements: Vec<Term>, tail: Term) -> Term {
        Term::List {
            elements,
            tail: Some(Box::new(tail)),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Term::Nil)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Term::Nil | Term::List { .. } | Term::String(_))
    }

    pub fn is_proper_list(&self) -> bool {
        match self {
            Term::Nil | Term::String(_) => true,
            Term::List { tail, .. } => tail.is_none(),
            _ => false,
        }
    }

    /// `true` for atoms that are booleans under the usual Erlang
    /// convention (`true`/`false` are ordinary atoms, not a separate tag).
    pub fn as_bool(&self) -> Option<bool> {
        let Term::Atom(atom) = self else { return None };
        let table = entities_atom::AtomTable::global();
        if *atom == table.true_() {
            Some(true)
        } else if *atom == table.false_() {
            Some(false)
        } else {
            None
        }
    }

    pub fn boolean(value: bool) -> Term {
        let table = entities_atom::AtomTable::global();
        Term::Atom(if value { table.true_() } else { table.false_() })
    }
}

/// Settings controlling `Display`-style formatting.
///
/// `creation` gates whether pid/port/ref output includes `:creation`
/// (`<node.id.serial.creation>` vs `<node.id.serial>`); off by default
/// because creation is rarely meaningful outside debugging a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOpts {
    pub creation: bool,
}

impl Default for DisplayOpts {
    fn default() -> Self {
        DisplayOpts { creation: false }
    }
}

/// Ordering used by `entities_pattern` for occurs-check bookkeeping and by
/// any caller that needs to put terms of the same shape in a `BTreeMap`.
/// Does not implement the full standard term order across different
/// variants (floats vs integers, pids vs atoms) since nothing in this
/// crate's scope requires it; only equal-variant comparisons are total.
impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Term::Small(a), Term::Small(b)) => a.partial_cmp(b),
            (Term::Big(a), Term::Big(b)) => a.partial_cmp(b),
            (Term::Float(a), Term::Float(b)) => a.partial_cmp(b),
            (Term::Atom(a), Term::Atom(b)) => a.index().partial_cmp(&b.index()),
            _ => None,
        }
    }
}
