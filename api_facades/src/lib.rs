//! API Facades Layer
//!
//! The single public surface external callers use: the node runtime
//! (`Node`, `Mailbox`, `SendTarget`), term construction and matching
//! (`Term`, `Pid`, `Reference`, `Pattern`, `Bindings`), and text formatting
//! (`format`, `eformat`). Inner-layer crates stay path-private to this
//! workspace; everything a caller needs comes through here.

pub use entities_atom::{Atom, AtomTable};
pub use entities_pattern::{binary_pattern, exact, pid_pattern, port_pattern, ref_pattern, Bindings, Pattern};
pub use entities_term::{DisplayOpts, Pid, Port, Reference, Term};
pub use usecases_node::{Mailbox, MsgKind, Node, NodeError, SendTarget, TransportMsg};

use infrastructure_textformat::FormatError;

/// Render `term` as Erlang-style text, e.g. `{ok,[1,2,3]}`.
pub fn format(term: &Term, atoms: &AtomTable, opts: DisplayOpts) -> String {
    infrastructure_textformat::format_term(term, atoms, opts)
}

/// Build a `Term` from an `eformat`-style placeholder template
/// (`~a ~s ~i ~l ~u ~f ~w`) and a list of substitution arguments.
pub fn eformat(fmt: &str, args: &[infrastructure_textformat::Arg], atoms: &AtomTable) -> Result<Term, FormatError> {
    infrastructure_textformat::eformat(fmt, args, atoms)
}

/// Try to match `term` against `pattern`, returning the bindings it
/// produced on success.
pub fn matches(pattern: &Pattern, term: &Term) -> Option<Bindings> {
    let mut bindings = Bindings::new();
    if pattern.match_term(term, &mut bindings) {
        Some(bindings)
    } else {
        None
    }
}
