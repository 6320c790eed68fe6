//! Byte-size computation: how many bytes [`crate::enc_term`]/[`crate::enc_term_int`]
//! will write for a given term, without actually writing them.
//!
//! Mirrors `encoding.rs`'s tag dispatch exactly rather than estimating, so
//! `size(term, ...) == enc_term_int(&mut buf, term, ...)` always holds —
//! callers that need to preallocate a frame buffer or check a term against
//! a size limit before paying for the encode can rely on the two agreeing.

use crate::flags::CodecFlags;
use entities_atom::AtomTable;
use entities_term::{Pid, Port, Reference, Term};
use infrastructure_bignum_encoding::BignumCodec;
use malachite::Integer;

/// Size in bytes of `enc_term(term, atoms, flags)`'s output, magic byte
/// included.
pub fn size_term(term: &Term, atoms: &AtomTable, flags: CodecFlags) -> usize {
    1 + size_term_int(term, atoms, flags)
}

/// Size in bytes of `enc_term_int`'s output for `term`: no leading magic
/// byte, just the tag-and-payload bytes for this one term.
pub fn size_term_int(term: &Term, atoms: &AtomTable, flags: CodecFlags) -> usize {
    match term {
        Term::Nil => 1,
        Term::Small(value) => size_integer(&Integer::from(*value)),
        Term::Big(value) => size_integer(value),
        Term::Float(_) => 9,
        Term::Atom(atom) => size_atom(*atom, atoms, flags),
        Term::Binary(bitstring) => size_binary(bitstring),
        Term::String(bytes) => size_string(bytes, atoms, flags),
        Term::List { elements, tail } => size_list(elements, tail.as_deref(), atoms, flags),
        Term::Tuple(elements) => size_tuple(elements, atoms, flags),
        Term::Map(pairs) => size_map(pairs, atoms, flags),
        Term::Pid(pid) => size_pid(pid, atoms, flags),
        Term::Port(port) => size_port(port, atoms, flags),
        Term::Ref(reference) => size_ref(reference, atoms, flags),
    }
}

fn size_integer(value: &Integer) -> usize {
    let (magnitude_bytes, is_negative) = infrastructure_bignum_encoding::integer_to_bytes(value);

    if magnitude_bytes.len() <= 8 {
        let mut magnitude: u64 = 0;
        for (i, &b) in magnitude_bytes.iter().enumerate() {
            magnitude |= (b as u64) << (8 * i);
        }
        if !is_negative && magnitude <= 255 {
            return 2;
        }
        let fits_i32 = if is_negative {
            magnitude <= (i32::MAX as u64) + 1
        } else {
            magnitude <= i32::MAX as u64
        };
        if fits_i32 {
            return 5;
        }
    }

    // Bignum tags carry no fixed width; ask the real codec for its length
    // rather than reconstructing its header-plus-digits arithmetic here.
    BignumCodec::encode(value).map(|bytes| bytes.len()).unwrap_or(0)
}

fn size_atom(atom: entities_atom::Atom, atoms: &AtomTable, flags: CodecFlags) -> usize {
    let Some(name) = atoms.name(atom) else {
        return 0;
    };
    if flags.utf8_atoms {
        if name.len() <= 255 {
            2 + name.len()
        } else {
            3 + name.len()
        }
    } else {
        let latin1_len = String::from_utf8_lossy(&name).chars().count();
        if latin1_len <= 255 {
            2 + latin1_len
        } else {
            3 + latin1_len
        }
    }
}

fn size_binary(bitstring: &entities_term::Bitstring) -> usize {
    if bitstring.is_byte_aligned() {
        5 + bitstring.data.len()
    } else {
        6 + bitstring.data.len()
    }
}

fn size_string(bytes: &[u8], atoms: &AtomTable, flags: CodecFlags) -> usize {
    if bytes.len() <= 65535 {
        3 + bytes.len()
    } else {
        let elements: Vec<Term> = bytes.iter().map(|&b| Term::Small(b as i64)).collect();
        size_list(&elements, None, atoms, flags)
    }
}

fn size_list(elements: &[Term], tail: Option<&Term>, atoms: &AtomTable, flags: CodecFlags) -> usize {
    if elements.is_empty() {
        return match tail {
            Some(t) => size_term_int(t, atoms, flags),
            None => 1,
        };
    }
    let mut total = 5;
    for element in elements {
        total += size_term_int(element, atoms, flags);
    }
    total += match tail {
        Some(t) => size_term_int(t, atoms, flags),
        None => 1,
    };
    total
}

fn size_tuple(elements: &[Term], atoms: &AtomTable, flags: CodecFlags) -> usize {
    let mut total = if elements.len() <= 255 { 2 } else { 5 };
    for element in elements {
        total += size_term_int(element, atoms, flags);
    }
    total
}

fn size_map(pairs: &[(Term, Term)], atoms: &AtomTable, flags: CodecFlags) -> usize {
    let mut total = 5;
    for (k, v) in pairs {
        total += size_term_int(k, atoms, flags);
        total += size_term_int(v, atoms, flags);
    }
    total
}

fn size_pid(pid: &Pid, atoms: &AtomTable, flags: CodecFlags) -> usize {
    size_atom(pid.node, atoms, flags)
        + if flags.extended_pids_ports {
            1 + 4 + 4 + 4
        } else {
            1 + 2 + 2 + 1
        }
}

fn size_port(port: &Port, atoms: &AtomTable, flags: CodecFlags) -> usize {
    size_atom(port.node, atoms, flags)
        + if flags.extended_pids_ports {
            let id_width = if port.id <= u32::MAX as u64 { 4 } else { 8 };
            1 + id_width + 4
        } else {
            1 + 4 + 1
        }
}

fn size_ref(reference: &Reference, atoms: &AtomTable, flags: CodecFlags) -> usize {
    size_atom(reference.node, atoms, flags)
        + if flags.extended_references {
            let creation_width = if flags.big_creation { 4 } else { 1 };
            1 + 2 + creation_width + reference.ids.len() * 4
        } else {
            1 + 4 + 1
        }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{enc_term, enc_term_int};

    fn atoms() -> AtomTable {
        AtomTable::new()
    }

    fn assert_size_matches(term: &Term, table: &AtomTable, flags: CodecFlags) {
        let encoded = enc_term(term, table, flags).unwrap();
        assert_eq!(size_term(term, table, flags), encoded.len());

        let mut buf = Vec::new();
        enc_term_int(&mut buf, term, table, flags).unwrap();
        assert_eq!(size_term_int(term, table, flags), buf.len());
    }

    #[test]
    fn nil_and_small_integers() {
        let table = atoms();
        assert_size_matches(&Term::Nil, &table, CodecFlags::default());
        assert_size_matches(&Term::Small(42), &table, CodecFlags::default());
        assert_size_matches(&Term::Small(-1), &table, CodecFlags::default());
        assert_size_matches(&Term::Small(1_000_000), &table, CodecFlags::default());
        assert_size_matches(&Term::Small(i64::MIN), &table, CodecFlags::default());
    }

    #[test]
    fn big_integer_beyond_i32() {
        let table = atoms();
        let huge = Integer::from(i64::MAX) * Integer::from(1000);
        assert_size_matches(&Term::Big(huge), &table, CodecFlags::default());
    }

    #[test]
    fn float_is_nine_bytes() {
        let table = atoms();
        assert_size_matches(&Term::Float(12345.6789), &table, CodecFlags::default());
    }

    #[test]
    fn short_and_long_atoms_utf8_and_legacy() {
        let table = atoms();
        let short = table.intern(b"abc").unwrap();
        let long_name = vec![b'a'; 300];
        let long = table.intern(&long_name).unwrap();

        assert_size_matches(&Term::Atom(short), &table, CodecFlags::default());
        assert_size_matches(&Term::Atom(long), &table, CodecFlags::default());
        assert_size_matches(&Term::Atom(short), &table, CodecFlags::legacy());
        assert_size_matches(&Term::Atom(long), &table, CodecFlags::legacy());
    }

    #[test]
    fn byte_aligned_and_bit_aligned_binaries() {
        let table = atoms();
        assert_size_matches(&Term::binary(vec![1, 2, 3, 4, 5]), &table, CodecFlags::default());

        let bitstring = entities_term::Bitstring { data: vec![0b1010_0000], bit_size: 3 };
        assert_size_matches(&Term::Binary(bitstring), &table, CodecFlags::default());
    }

    #[test]
    fn strings_under_and_over_the_string_ext_limit() {
        let table = atoms();
        assert_size_matches(&Term::String(vec![1, 2, 3]), &table, CodecFlags::default());

        let long_string = Term::String(vec![7u8; 70_000]);
        assert_size_matches(&long_string, &table, CodecFlags::default());
    }

    #[test]
    fn proper_and_improper_lists_tuples_and_maps() {
        let table = atoms();
        let ok = table.ok();

        assert_size_matches(&Term::proper_list(vec![Term::Small(1), Term::Small(2)]), &table, CodecFlags::default());
        assert_size_matches(
            &Term::improper_list(vec![Term::Small(1)], Term::Small(2)),
            &table,
            CodecFlags::default(),
        );
        assert_size_matches(&Term::Tuple(vec![Term::Atom(ok), Term::Small(1)]), &table, CodecFlags::default());
        assert_size_matches(&Term::Map(vec![(Term::Atom(ok), Term::Small(1))]), &table, CodecFlags::default());
    }

    #[test]
    fn pid_port_ref_legacy_and_extended_forms() {
        let table = atoms();
        let node = table.intern(b"node@host").unwrap();
        let pid = Pid { node, id: 100_000, serial: 9000, creation: 5 };
        let port = Port { node, id: 42, creation: 5 };
        let reference = Reference { node, creation: 5, ids: vec![1, 2, 3] };

        assert_size_matches(&Term::Pid(pid.clone()), &table, CodecFlags::default());
        assert_size_matches(&Term::Pid(pid), &table, CodecFlags::legacy());
        assert_size_matches(&Term::Port(port.clone()), &table, CodecFlags::default());
        assert_size_matches(&Term::Port(port), &table, CodecFlags::legacy());
        assert_size_matches(&Term::Ref(reference.clone()), &table, CodecFlags::default());
        assert_size_matches(&Term::Ref(reference), &table, CodecFlags::legacy());
    }
}
