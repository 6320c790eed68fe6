//! Human-readable term formatting.
//!
//! Recursive descent into a byte buffer, resolving atom names through an
//! [`AtomTable`] rather than printing a bare index, quoting atoms and
//! strings the way `erlang:display/1` does, and using proper `[H|T]` dot
//! syntax for improper lists rather than recursing into the tail as if it
//! were another list element.

use entities_atom::AtomTable;
use entities_term::{DisplayOpts, Term};

/// Render `term` as Erlang would print it with `io:format("~p", [Term])`.
pub fn format_term(term: &Term, atoms: &AtomTable, opts: DisplayOpts) -> String {
    let mut out = String::new();
    write_term(term, atoms, opts, &mut out);
    out
}

fn write_term(term: &Term, atoms: &AtomTable, opts: DisplayOpts, out: &mut String) {
    match term {
        Term::Nil => out.push_str("[]"),
        Term::Small(n) => out.push_str(&n.to_string()),
        Term::Big(n) => out.push_str(&n.to_string()),
        Term::Float(f) => write_float(*f, out),
        Term::Atom(atom) => write_atom(*atom, atoms, out),
        Term::Binary(bitstring) => write_binary(bitstring, out),
        Term::String(bytes) => write_string_literal(bytes, out),
        Term::List { elements, tail } => write_list(elements, tail.as_deref(), atoms, opts, out),
        Term::Tuple(elements) => write_tuple(elements, atoms, opts, out),
        Term::Map(pairs) => write_map(pairs, atoms, opts, out),
        Term::Pid(pid) => write_pid(pid, atoms, opts, out),
        Term::Port(port) => write_port(port, atoms, opts, out),
        Term::Ref(reference) => write_ref(reference, atoms, opts, out),
    }
}

fn write_float(value: f64, out: &mut String) {
    if value.fract() == 0.0 && value.is_finite() {
        out.push_str(&format!("{value:.1}"));
    } else {
        out.push_str(&value.to_string());
    }
}

/// An atom prints bare when it looks like `[a-z][a-zA-Z0-9_@]*`; anything
/// else (including the empty atom, atoms starting uppercase, atoms with
/// spaces) gets single-quoted with `'` and `\` escaped.
fn write_atom(atom: entities_atom::Atom, atoms: &AtomTable, out: &mut String) {
    let Some(name) = atoms.name(atom) else {
        out.push_str("'<badatom>'");
        return;
    };
    let name = String::from_utf8_lossy(&name);
    if needs_quoting(&name) {
        out.push('\'');
        for c in name.chars() {
            match c {
                '\'' => out.push_str("\\'"),
                '\\' => out.push_str("\\\\"),
                other => out.push(other),
            }
        }
        out.push('\'');
    } else {
        out.push_str(&name);
    }
}

fn needs_quoting(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@')
        }
        _ => true,
    }
}

fn write_binary(bitstring: &entities_term::Bitstring, out: &mut String) {
    out.push_str("<<");
    for (i, byte) in bitstring.data.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&byte.to_string());
    }
    if !bitstring.is_byte_aligned() {
        let used_bits = bitstring.bit_size % 8;
        let used_bits = if used_bits == 0 { 8 } else { used_bits };
        out.push_str(&format!(":{used_bits}"));
    }
    out.push_str(">>");
}

fn write_string_literal(bytes: &[u8], out: &mut String) {
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            other => out.push_str(&format!("\\x{other:02x}")),
        }
    }
    out.push('"');
}

fn write_list(
    elements: &[Term],
    tail: Option<&Term>,
    atoms: &AtomTable,
    opts: DisplayOpts,
    out: &mut String,
) {
    out.push('[');
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_term(element, atoms, opts, out);
    }
    if let Some(tail) = tail {
        out.push('|');
        write_term(tail, atoms, opts, out);
    }
    out.push(']');
}

fn write_tuple(elements: &[Term], atoms: &AtomTable, opts: DisplayOpts, out: &mut String) {
    out.push('{');
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_term(element, atoms, opts, out);
    }
    out.push('}');
}

fn write_map(pairs: &[(Term, Term)], atoms: &AtomTable, opts: DisplayOpts, out: &mut String) {
    out.push_str("#{");
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_term(key, atoms, opts, out);
        out.push_str("=>");
        write_term(value, atoms, opts, out);
    }
    out.push('}');
}

fn write_pid(pid: &entities_term::Pid, atoms: &AtomTable, opts: DisplayOpts, out: &mut String) {
    out.push('<');
    write_atom(pid.node, atoms, out);
    out.push('.');
    out.push_str(&pid.id.to_string());
    out.push('.');
    out.push_str(&pid.serial.to_string());
    if opts.creation {
        out.push('.');
        out.push_str(&pid.creation.to_string());
    }
    out.push('>');
}

fn write_port(port: &entities_term::Port, atoms: &AtomTable, opts: DisplayOpts, out: &mut String) {
    out.push_str("#Port<");
    write_atom(port.node, atoms, out);
    out.push('.');
    out.push_str(&port.id.to_string());
    if opts.creation {
        out.push('.');
        out.push_str(&port.creation.to_string());
    }
    out.push('>');
}

fn write_ref(reference: &entities_term::Reference, atoms: &AtomTable, opts: DisplayOpts, out: &mut String) {
    out.push_str("#Ref<");
    write_atom(reference.node, atoms, out);
    for id in &reference.ids {
        out.push('.');
        out.push_str(&id.to_string());
    }
    if opts.creation {
        out.push('.');
        out.push_str(&reference.creation.to_string());
    }
    out.push('>');
}
