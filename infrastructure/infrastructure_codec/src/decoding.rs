//! Decoding: external term format bytes -> `Term`.
//!
//! Mirrors `encoding.rs`'s tag dispatch. Every function returns the decoded
//! value plus the number of bytes consumed, so callers decoding a stream of
//! back-to-back terms (as the frame reader does for control message +
//! payload) can advance their cursor without re-scanning.

use crate::constants::*;
use crate::error::CodecError;
use crate::flags::CodecFlags;
use entities_atom::AtomTable;
use entities_term::{Bitstring, Pid, Port, Reference, Term};
use infrastructure_bignum_encoding::BignumCodec;
use malachite::Integer;

/// Decode a term that begins with the version magic byte.
pub fn dec_term(data: &[u8], atoms: &AtomTable, flags: CodecFlags) -> Result<(Term, usize), CodecError> {
    let &magic = data.first().ok_or(CodecError::UnexpectedEof)?;
    if magic != VERSION_MAGIC {
        return Err(CodecError::MissingVersionMagic);
    }
    let (term, consumed) = dec_term_int(&data[1..], atoms, flags)?;
    Ok((term, consumed + 1))
}

/// Decode a term with no leading version magic (the recursive step, and
/// the form control-message payloads use on the wire).
pub fn dec_term_int(data: &[u8], atoms: &AtomTable, flags: CodecFlags) -> Result<(Term, usize), CodecError> {
    let &tag = data.first().ok_or(CodecError::UnexpectedEof)?;
    let rest = &data[1..];
    match tag {
        NIL_EXT => Ok((Term::Nil, 1)),
        SMALL_INTEGER_EXT => {
            let &b = rest.first().ok_or(CodecError::UnexpectedEof)?;
            Ok((Term::Small(b as i64), 2))
        }
        INTEGER_EXT => {
            let bytes: [u8; 4] = rest.get(0..4).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
            Ok((Term::Small(i32::from_be_bytes(bytes) as i64), 5))
        }
        SMALL_BIG_EXT | LARGE_BIG_EXT => {
            let (value, consumed) = BignumCodec::decode(data)?;
            Ok((normalize_integer(value), consumed))
        }
        FLOAT_EXT => dec_float_ext(rest),
        NEW_FLOAT_EXT => {
            let bytes: [u8; 8] = rest.get(0..8).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
            Ok((Term::Float(f64::from_bits(u64::from_be_bytes(bytes))), 9))
        }
        ATOM_EXT | SMALL_ATOM_EXT | ATOM_UTF8_EXT | SMALL_ATOM_UTF8_EXT => dec_atom(data, atoms),
        BINARY_EXT => dec_binary(rest),
        BIT_BINARY_EXT => dec_bit_binary(rest),
        STRING_EXT => dec_string(rest),
        LIST_EXT => dec_list(rest, atoms, flags),
        SMALL_TUPLE_EXT => dec_tuple(rest, false, atoms, flags),
        LARGE_TUPLE_EXT => dec_tuple(rest, true, atoms, flags),
        MAP_EXT => dec_map(rest, atoms, flags),
        PID_EXT | NEW_PID_EXT => dec_pid(data, atoms, flags),
        PORT_EXT | NEW_PORT_EXT | V4_PORT_EXT => dec_port(data, atoms, flags),
        REFERENCE_EXT | NEW_REFERENCE_EXT | NEWER_REFERENCE_EXT => dec_ref(data, atoms, flags),
        other => Err(CodecError::UnknownTag(other)),
    }
}

/// Collapse a decoded bignum back to `Term::Small` when it fits in an
/// `i64`, matching the fact that nothing downstream should care which wire
/// tag produced a given value.
fn normalize_integer(value: Integer) -> Term {
    let min = Integer::from(i64::MIN);
    let max = Integer::from(i64::MAX);
    if value >= min && value <= max {
        let (bytes, is_negative) = infrastructure_bignum_encoding::integer_to_bytes(&value);
        let mut magnitude: u64 = 0;
        for (i, &b) in bytes.iter().enumerate().take(8) {
            magnitude |= (b as u64) << (8 * i);
        }
        // `i64::MIN`'s magnitude is 2^63, one past `i64::MAX`; negating it
        // via `-(magnitude as i64)` overflows, so it needs its own case.
        let as_i64 = if is_negative {
            if magnitude == 1u64 << 63 {
                i64::MIN
            } else {
                -(magnitude as i64)
            }
        } else {
            magnitude as i64
        };
        Term::Small(as_i64)
    } else {
        Term::Big(value)
    }
}

fn dec_float_ext(rest: &[u8]) -> Result<(Term, usize), CodecError> {
    let field = rest.get(0..31).ok_or(CodecError::UnexpectedEof)?;
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..end]).map_err(|_| CodecError::InvalidUtf8)?;
    let value: f64 = text.trim().parse().map_err(|_| CodecError::LengthMismatch)?;
    Ok((Term::Float(value), 32))
}

fn dec_atom(data: &[u8], atoms: &AtomTable) -> Result<(Term, usize), CodecError> {
    let tag = data[0];
    let rest = &data[1..];
    let (len, header_len): (usize, usize) = match tag {
        SMALL_ATOM_EXT | SMALL_ATOM_UTF8_EXT => (*rest.first().ok_or(CodecError::UnexpectedEof)? as usize, 1),
        ATOM_EXT | ATOM_UTF8_EXT => {
            let bytes: [u8; 2] = rest.get(0..2).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
            (u16::from_be_bytes(bytes) as usize, 2)
        }
        other => return Err(CodecError::UnknownTag(other)),
    };
    let name_bytes = rest.get(header_len..header_len + len).ok_or(CodecError::UnexpectedEof)?;
    let name = match tag {
        ATOM_UTF8_EXT | SMALL_ATOM_UTF8_EXT => name_bytes.to_vec(),
        _ => latin1_to_utf8(name_bytes),
    };
    let atom = atoms.intern(&name)?;
    Ok((Term::Atom(atom), 1 + header_len + len))
}

fn latin1_to_utf8(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|&b| char::from(b).to_string().into_bytes()).collect()
}

fn dec_binary(rest: &[u8]) -> Result<(Term, usize), CodecError> {
    let len_bytes: [u8; 4] = rest.get(0..4).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
    let len = u32::from_be_bytes(len_bytes) as usize;
    let data = rest.get(4..4 + len).ok_or(CodecError::UnexpectedEof)?.to_vec();
    Ok((Term::binary(data), 1 + 4 + len))
}

fn dec_bit_binary(rest: &[u8]) -> Result<(Term, usize), CodecError> {
    let len_bytes: [u8; 4] = rest.get(0..4).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
    let len = u32::from_be_bytes(len_bytes) as usize;
    let &bits_in_last_byte = rest.get(4).ok_or(CodecError::UnexpectedEof)?;
    let data = rest.get(5..5 + len).ok_or(CodecError::UnexpectedEof)?.to_vec();
    let bit_size = if len == 0 {
        0
    } else {
        (len - 1) * 8 + bits_in_last_byte as usize
    };
    Ok((Term::Binary(Bitstring { data, bit_size }), 1 + 4 + 1 + len))
}

fn dec_string(rest: &[u8]) -> Result<(Term, usize), CodecError> {
    let len_bytes: [u8; 2] = rest.get(0..2).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
    let len = u16::from_be_bytes(len_bytes) as usize;
    let data = rest.get(2..2 + len).ok_or(CodecError::UnexpectedEof)?.to_vec();
    Ok((Term::String(data), 1 + 2 + len))
}

fn dec_list(rest: &[u8], atoms: &AtomTable, flags: CodecFlags) -> Result<(Term, usize), CodecError> {
    let len_bytes: [u8; 4] = rest.get(0..4).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
    let len = u32::from_be_bytes(len_bytes) as usize;
    let mut cursor = 4;
    let mut elements = Vec::with_capacity(len);
    for _ in 0..len {
        let (term, consumed) = dec_term_int(&rest[cursor..], atoms, flags)?;
        elements.push(term);
        cursor += consumed;
    }
    let (tail, tail_consumed) = dec_term_int(&rest[cursor..], atoms, flags)?;
    cursor += tail_consumed;
    let term = match tail {
        Term::Nil => Term::List { elements, tail: None },
        other => Term::List {
            elements,
            tail: Some(Box::new(other)),
        },
    };
    Ok((term, 1 + cursor))
}

fn dec_tuple(rest: &[u8], large: bool, atoms: &AtomTable, flags: CodecFlags) -> Result<(Term, usize), CodecError> {
    let (arity, header_len) = if large {
        let bytes: [u8; 4] = rest.get(0..4).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
        (u32::from_be_bytes(bytes) as usize, 4)
    } else {
        (*rest.first().ok_or(CodecError::UnexpectedEof)? as usize, 1)
    };
    let mut cursor = header_len;
    let mut elements = Vec::with_capacity(arity);
    for _ in 0..arity {
        let (term, consumed) = dec_term_int(&rest[cursor..], atoms, flags)?;
        elements.push(term);
        cursor += consumed;
    }
    Ok((Term::Tuple(elements), 1 + cursor))
}

fn dec_map(rest: &[u8], atoms: &AtomTable, flags: CodecFlags) -> Result<(Term, usize), CodecError> {
    let len_bytes: [u8; 4] = rest.get(0..4).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
    let arity = u32::from_be_bytes(len_bytes) as usize;
    let mut cursor = 4;
    let mut pairs = Vec::with_capacity(arity);
    for _ in 0..arity {
        let (key, consumed) = dec_term_int(&rest[cursor..], atoms, flags)?;
        cursor += consumed;
        let (value, consumed) = dec_term_int(&rest[cursor..], atoms, flags)?;
        cursor += consumed;
        pairs.push((key, value));
    }
    Ok((Term::Map(pairs), 1 + cursor))
}

fn dec_pid(data: &[u8], atoms: &AtomTable, flags: CodecFlags) -> Result<(Term, usize), CodecError> {
    let (node_term, node_consumed) = dec_term_int(data, atoms, flags)?;
    let node = expect_atom(node_term)?;
    let rest = &data[node_consumed..];
    let tag = rest.first().ok_or(CodecError::UnexpectedEof)?;
    let body = &rest[1..];
    let (pid, body_consumed) = if *tag == NEW_PID_EXT {
        let id = take_u32(body, 0)?;
        let serial = take_u32(body, 4)?;
        let creation = take_u32(body, 8)?;
        (Pid { node, id, serial, creation }, 12)
    } else {
        let id = take_u32(body, 0)? & 0x7fff;
        let serial = take_u32(body, 4)? & 0x1fff;
        let creation = *body.get(8).ok_or(CodecError::UnexpectedEof)? as u32 & 0x03;
        (Pid { node, id, serial, creation }, 9)
    };
    Ok((Term::Pid(pid), node_consumed + 1 + body_consumed))
}

fn dec_port(data: &[u8], atoms: &AtomTable, flags: CodecFlags) -> Result<(Term, usize), CodecError> {
    let (node_term, node_consumed) = dec_term_int(data, atoms, flags)?;
    let node = expect_atom(node_term)?;
    let rest = &data[node_consumed..];
    let tag = rest.first().ok_or(CodecError::UnexpectedEof)?;
    let body = &rest[1..];
    let (port, body_consumed) = match *tag {
        NEW_PORT_EXT => {
            let id = take_u32(body, 0)? as u64;
            let creation = take_u32(body, 4)?;
            (Port { node, id, creation }, 8)
        }
        V4_PORT_EXT => {
            let bytes: [u8; 8] = body.get(0..8).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
            let id = u64::from_be_bytes(bytes);
            let creation = take_u32(body, 8)?;
            (Port { node, id, creation }, 12)
        }
        _ => {
            let id = take_u32(body, 0)? as u64 & 0x0fff_ffff;
            let creation = *body.get(4).ok_or(CodecError::UnexpectedEof)? as u32 & 0x03;
            (Port { node, id, creation }, 5)
        }
    };
    Ok((Term::Port(port), node_consumed + 1 + body_consumed))
}

fn dec_ref(data: &[u8], atoms: &AtomTable, flags: CodecFlags) -> Result<(Term, usize), CodecError> {
    let (node_term, node_consumed) = dec_term_int(data, atoms, flags)?;
    let node = expect_atom(node_term)?;
    let rest = &data[node_consumed..];
    let tag = *rest.first().ok_or(CodecError::UnexpectedEof)?;
    let body = &rest[1..];

    let (reference, body_consumed) = match tag {
        NEW_REFERENCE_EXT | NEWER_REFERENCE_EXT => {
            let len_bytes: [u8; 2] = body.get(0..2).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
            let word_count = u16::from_be_bytes(len_bytes) as usize;
            let (creation, creation_len) = if tag == NEWER_REFERENCE_EXT {
                (take_u32(body, 2)?, 4)
            } else {
                (*body.get(2).ok_or(CodecError::UnexpectedEof)? as u32, 1)
            };
            let mut cursor = 2 + creation_len;
            let mut ids = Vec::with_capacity(word_count);
            for _ in 0..word_count {
                ids.push(take_u32(body, cursor)?);
                cursor += 4;
            }
            (Reference { node, ids, creation }, cursor)
        }
        _ => {
            let id = take_u32(body, 0)? & 0x0003_ffff;
            let creation = *body.get(4).ok_or(CodecError::UnexpectedEof)? as u32 & 0x03;
            (
                Reference {
                    node,
                    ids: vec![id],
                    creation,
                },
                5,
            )
        }
    };
    Ok((Term::Ref(reference), node_consumed + 1 + body_consumed))
}

fn take_u32(data: &[u8], offset: usize) -> Result<u32, CodecError> {
    let bytes: [u8; 4] = data.get(offset..offset + 4).ok_or(CodecError::UnexpectedEof)?.try_into().unwrap();
    Ok(u32::from_be_bytes(bytes))
}

fn expect_atom(term: Term) -> Result<entities_atom::Atom, CodecError> {
    match term {
        Term::Atom(a) => Ok(a),
        _ => Err(CodecError::UnknownTag(0)),
    }
}
