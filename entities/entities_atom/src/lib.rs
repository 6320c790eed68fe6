//! Entities Layer: Atom Table
//!
//! Atoms are interned once and referenced everywhere else by index. This
//! crate owns the table: a forward name->index map, a reverse index->name
//! map, and a fixed set of atoms interned up front so the rest of the crate
//! can refer to `ok`, `true`, `error` and friends without re-validating them
//! on every use.
//!
//! This is the innermost layer: no dependencies on any other crate here.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// Default cap on the number of distinct atoms a table will hold.
///
/// Mirrors the practical BEAM default; nothing in this crate requires this
/// exact value, it just keeps a runaway peer from growing the table without
/// bound.
pub const DEFAULT_ATOM_LIMIT: usize = 1_048_576;

/// Longest atom name this table will intern, in bytes. Matches the
/// `ATOM_UTF8_EXT`/`ATOM_EXT` wire length field, which is 16 bits.
pub const MAX_ATOM_LEN: usize = 65535;

/// A reference to an interned atom. Cheap to copy, compares by index only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

impl Atom {
    /// Raw table index. Exposed for codecs that need to write it on the wire.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Wrap a raw index without validating it against any table.
    ///
    /// Callers that decode an index off the wire use this, then immediately
    /// resolve the name through the table that is supposed to own it.
    pub fn from_index(index: u32) -> Self {
        Atom(index)
    }
}

/// Atom table errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomError {
    /// Name longer than `MAX_ATOM_LEN` bytes.
    TooLong,
    /// Table already holds `limit` distinct atoms.
    TableFull,
}

impl std::fmt::Display for AtomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomError::TooLong => write!(f, "atom name exceeds {MAX_ATOM_LEN} bytes"),
            AtomError::TableFull => write!(f, "atom table is full"),
        }
    }
}

impl std::error::Error for AtomError {}

/// Insert-only atom table.
///
/// Interning is idempotent: calling `intern` twice with the same bytes
/// returns the same `Atom`. Entries are never removed, so an `Atom` handed
/// out by one call stays valid for the table's lifetime.
pub struct AtomTable {
    by_name: RwLock<HashMap<Box<[u8]>, u32>>,
    by_index: RwLock<Vec<Box<[u8]>>>,
    limit: usize,
}

impl AtomTable {
    /// Create an empty table with the default limit and seed the
    /// well-known atoms every other part of this crate relies on.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_ATOM_LIMIT)
    }

    /// Create an empty table bounded at `limit` distinct atoms.
    pub fn with_limit(limit: usize) -> Self {
        let table = Self {
            by_name: RwLock::new(HashMap::new()),
            by_index: RwLock::new(Vec::new()),
            limit,
        };
        for name in PREDEFINED {
            table.intern(name.as_bytes()).expect("predefined atom fits");
        }
        table
    }

    /// Intern `name`, returning its existing `Atom` if already present.
    pub fn intern(&self, name: &[u8]) -> Result<Atom, AtomError> {
        if name.len() > MAX_ATOM_LEN {
            return Err(AtomError::TooLong);
        }
        if let Some(&index) = self.by_name.read().unwrap().get(name) {
            return Ok(Atom(index));
        }
        let mut by_name = self.by_name.write().unwrap();
        // Re-check under the write lock: another thread may have interned
        // `name` between the read above and taking this lock.
        if let Some(&index) = by_name.get(name) {
            return Ok(Atom(index));
        }
        let mut by_index = self.by_index.write().unwrap();
        if by_index.len() >= self.limit {
            return Err(AtomError::TableFull);
        }
        let index = by_index.len() as u32;
        by_index.push(name.into());
        by_name.insert(name.into(), index);
        Ok(Atom(index))
    }

    /// Look up an atom's name without interning anything.
    pub fn name(&self, atom: Atom) -> Option<Box<[u8]>> {
        self.by_index.read().unwrap().get(atom.0 as usize).cloned()
    }

    /// Look up an already-interned atom by name, without creating it.
    pub fn lookup(&self, name: &[u8]) -> Option<Atom> {
        self.by_name.read().unwrap().get(name).map(|&i| Atom(i))
    }

    /// Number of distinct atoms currently interned.
    pub fn len(&self) -> usize {
        self.by_index.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The process-wide default table, lazily created on first use.
    pub fn global() -> &'static AtomTable {
        static TABLE: OnceLock<AtomTable> = OnceLock::new();
        TABLE.get_or_init(AtomTable::new)
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Atoms interned at construction so lookups for them never fail.
///
/// `badrpc call cast erlang error false format $gen_cast io_lib latin1
/// noconnection noproc normal ok request rex rpc true undefined unsupported
/// user _` come from the names the distribution control protocol and the
/// handshake error paths actually reference; `down`, `monitor`, `demonitor`,
/// `exit`, `exit2`, `link`, `unlink`, `send`, `reg_send`, `nocookie`,
/// `timeout` are added because this crate's node runtime sends and matches
/// on them directly.
const PREDEFINED: &[&str] = &[
    "_",
    "badrpc",
    "call",
    "cast",
    "demonitor",
    "down",
    "erlang",
    "error",
    "exit",
    "exit2",
    "false",
    "format",
    "$gen_cast",
    "io_lib",
    "latin1",
    "link",
    "monitor",
    "nocookie",
    "noconnection",
    "noproc",
    "normal",
    "ok",
    "reg_send",
    "request",
    "rex",
    "rpc",
    "send",
    "timeout",
    "true",
    "undefined",
    "unlink",
    "unsupported",
    "user",
];

macro_rules! well_known {
    ($($fn_name:ident => $text:expr),+ $(,)?) => {
        impl AtomTable {
            $(
                #[doc = concat!("The pre-interned `", $text, "` atom.")]
                pub fn $fn_name(&self) -> Atom {
                    self.lookup($text.as_bytes())
                        .expect("predefined atom was seeded at construction")
                }
            )+
        }
    };
}

well_known! {
    ok => "ok",
    error => "error",
    true_ => "true",
    false_ => "false",
    undefined => "undefined",
    normal => "normal",
    down => "down",
    noproc => "noproc",
    noconnection => "noconnection",
    timeout => "timeout",
    user => "user",
    nocookie => "nocookie",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let table = AtomTable::new();
        let a = table.intern(b"hello").unwrap();
        let b = table.intern(b"hello").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_names_get_distinct_atoms() {
        let table = AtomTable::new();
        let a = table.intern(b"alpha").unwrap();
        let b = table.intern(b"beta").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn name_round_trips() {
        let table = AtomTable::new();
        let a = table.intern(b"round_trip").unwrap();
        assert_eq!(table.name(a).unwrap().as_ref(), b"round_trip");
    }

    #[test]
    fn lookup_without_intern_misses() {
        let table = AtomTable::new();
        assert!(table.lookup(b"never_interned").is_none());
    }

    #[test]
    fn too_long_name_is_rejected() {
        let table = AtomTable::new();
        let name = vec![b'a'; MAX_ATOM_LEN + 1];
        assert_eq!(table.intern(&name), Err(AtomError::TooLong));
    }

    #[test]
    fn table_full_is_reported() {
        let table = AtomTable::with_limit(PREDEFINED.len());
        // Every slot is already used by the predefined seed set.
        assert_eq!(table.intern(b"overflow"), Err(AtomError::TableFull));
    }

    #[test]
    fn predefined_atoms_resolve() {
        let table = AtomTable::new();
        assert_eq!(table.name(table.ok()).unwrap().as_ref(), b"ok");
        assert_eq!(table.name(table.true_()).unwrap().as_ref(), b"true");
        assert_eq!(table.name(table.down()).unwrap().as_ref(), b"down");
    }

    #[test]
    fn global_table_is_shared() {
        let a = AtomTable::global().intern(b"shared").unwrap();
        let b = AtomTable::global().intern(b"shared").unwrap();
        assert_eq!(a, b);
    }
}
