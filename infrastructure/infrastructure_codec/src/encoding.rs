//! Encoding: `Term` -> external term format bytes.
//!
//! Full tag dispatch over every `Term` variant, including the pid/port/ref
//! legacy-vs-extended forms and bit-aligned binaries.

use crate::constants::*;
use crate::error::CodecError;
use crate::flags::CodecFlags;
use entities_atom::AtomTable;
use entities_term::{Pid, Port, Reference, Term};
use infrastructure_bignum_encoding::BignumCodec;
use malachite::Integer;

/// Encode `term` with the leading version magic byte.
pub fn enc_term(term: &Term, atoms: &AtomTable, flags: CodecFlags) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![VERSION_MAGIC];
    enc_term_int(&mut buf, term, atoms, flags)?;
    Ok(buf)
}

/// Encode `term` onto the end of `buf`, without a version magic byte. Used
/// both as the recursive step and by callers (like frame assembly) that
/// want to pack more than one ETF blob into the same buffer.
pub fn enc_term_int(
    buf: &mut Vec<u8>,
    term: &Term,
    atoms: &AtomTable,
    flags: CodecFlags,
) -> Result<(), CodecError> {
    match term {
        Term::Nil => buf.push(NIL_EXT),
        Term::Small(value) => enc_integer(buf, &Integer::from(*value))?,
        Term::Big(value) => enc_integer(buf, value)?,
        Term::Float(value) => enc_float(buf, *value),
        Term::Atom(atom) => enc_atom(buf, *atom, atoms, flags)?,
        Term::Binary(bitstring) => enc_binary(buf, bitstring),
        Term::String(bytes) => enc_string(buf, bytes, atoms, flags)?,
        Term::List { elements, tail } => enc_list(buf, elements, tail.as_deref(), atoms, flags)?,
        Term::Tuple(elements) => enc_tuple(buf, elements, atoms, flags)?,
        Term::Map(pairs) => enc_map(buf, pairs, atoms, flags)?,
        Term::Pid(pid) => enc_pid(buf, pid, atoms, flags)?,
        Term::Port(port) => enc_port(buf, port, atoms, flags)?,
        Term::Ref(reference) => enc_ref(buf, reference, atoms, flags)?,
    }
    Ok(())
}

fn enc_integer(buf: &mut Vec<u8>, value: &Integer) -> Result<(), CodecError> {
    let (magnitude_bytes, is_negative) = infrastructure_bignum_encoding::integer_to_bytes(value);

    if magnitude_bytes.len() <= 8 {
        let mut magnitude: u64 = 0;
        for (i, &b) in magnitude_bytes.iter().enumerate() {
            magnitude |= (b as u64) << (8 * i);
        }
        if !is_negative && magnitude <= 255 {
            buf.push(SMALL_INTEGER_EXT);
            buf.push(magnitude as u8);
            return Ok(());
        }
        // INTEGER_EXT carries a signed 32-bit value; only representable
        // when the magnitude itself fits alongside its sign bit.
        let fits_i32 = if is_negative {
            magnitude <= (i32::MAX as u64) + 1
        } else {
            magnitude <= i32::MAX as u64
        };
        if fits_i32 {
            let signed = if is_negative {
                -(magnitude as i64)
            } else {
                magnitude as i64
            };
            buf.push(INTEGER_EXT);
            buf.extend_from_slice(&(signed as i32).to_be_bytes());
            return Ok(());
        }
    }

    let encoded = BignumCodec::encode(value)?;
    buf.extend_from_slice(&encoded);
    Ok(())
}

fn enc_float(buf: &mut Vec<u8>, value: f64) {
    buf.push(NEW_FLOAT_EXT);
    buf.extend_from_slice(&value.to_bits().to_be_bytes());
}

fn enc_atom(
    buf: &mut Vec<u8>,
    atom: entities_atom::Atom,
    atoms: &AtomTable,
    flags: CodecFlags,
) -> Result<(), CodecError> {
    let name = atoms.name(atom).ok_or(CodecError::AtomNotInterned)?;
    if flags.utf8_atoms {
        if name.len() <= 255 {
            buf.push(SMALL_ATOM_UTF8_EXT);
            buf.push(name.len() as u8);
        } else {
            buf.push(ATOM_UTF8_EXT);
            buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        }
        buf.extend_from_slice(&name);
    } else {
        // Legacy peers only understand Latin-1 atom names; this crate's
        // atom table stores UTF-8, so names outside Latin-1 can't round
        // trip through this path (matches the real limitation: a legacy
        // node genuinely cannot represent those atoms either).
        let latin1: Vec<u8> = String::from_utf8_lossy(&name).chars().map(|c| c as u8).collect();
        if latin1.len() <= 255 {
            buf.push(SMALL_ATOM_EXT);
            buf.push(latin1.len() as u8);
        } else {
            buf.push(ATOM_EXT);
            buf.extend_from_slice(&(latin1.len() as u16).to_be_bytes());
        }
        buf.extend_from_slice(&latin1);
    }
    Ok(())
}

fn enc_binary(buf: &mut Vec<u8>, bitstring: &entities_term::Bitstring) {
    if bitstring.is_byte_aligned() {
        buf.push(BINARY_EXT);
        buf.extend_from_slice(&(bitstring.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&bitstring.data);
    } else {
        buf.push(BIT_BINARY_EXT);
        buf.extend_from_slice(&(bitstring.data.len() as u32).to_be_bytes());
        let bits_in_last_byte = if bitstring.bit_size == 0 {
            0
        } else {
            let rem = bitstring.bit_size % 8;
            if rem == 0 {
                8
            } else {
                rem
            }
        };
        buf.push(bits_in_last_byte as u8);
        buf.extend_from_slice(&bitstring.data);
    }
}

fn enc_string(
    buf: &mut Vec<u8>,
    bytes: &[u8],
    atoms: &AtomTable,
    flags: CodecFlags,
) -> Result<(), CodecError> {
    if bytes.len() <= 65535 {
        buf.push(STRING_EXT);
        buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        buf.extend_from_slice(bytes);
        Ok(())
    } else {
        let elements: Vec<Term> = bytes.iter().map(|&b| Term::Small(b as i64)).collect();
        enc_list(buf, &elements, None, atoms, flags)
    }
}

fn enc_list(
    buf: &mut Vec<u8>,
    elements: &[Term],
    tail: Option<&Term>,
    atoms: &AtomTable,
    flags: CodecFlags,
) -> Result<(), CodecError> {
    if elements.is_empty() {
        return match tail {
            Some(t) => enc_term_int(buf, t, atoms, flags),
            None => {
                buf.push(NIL_EXT);
                Ok(())
            }
        };
    }
    buf.push(LIST_EXT);
    buf.extend_from_slice(&(elements.len() as u32).to_be_bytes());
    for element in elements {
        enc_term_int(buf, element, atoms, flags)?;
    }
    match tail {
        Some(t) => enc_term_int(buf, t, atoms, flags)?,
        None => buf.push(NIL_EXT),
    }
    Ok(())
}

fn enc_tuple(
    buf: &mut Vec<u8>,
    elements: &[Term],
    atoms: &AtomTable,
    flags: CodecFlags,
) -> Result<(), CodecError> {
    if elements.len() <= 255 {
        buf.push(SMALL_TUPLE_EXT);
        buf.push(elements.len() as u8);
    } else {
        buf.push(LARGE_TUPLE_EXT);
        buf.extend_from_slice(&(elements.len() as u32).to_be_bytes());
    }
    for element in elements {
        enc_term_int(buf, element, atoms, flags)?;
    }
    Ok(())
}

fn enc_map(
    buf: &mut Vec<u8>,
    pairs: &[(Term, Term)],
    atoms: &AtomTable,
    flags: CodecFlags,
) -> Result<(), CodecError> {
    buf.push(MAP_EXT);
    buf.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
    for (k, v) in pairs {
        enc_term_int(buf, k, atoms, flags)?;
        enc_term_int(buf, v, atoms, flags)?;
    }
    Ok(())
}

fn enc_pid(buf: &mut Vec<u8>, pid: &Pid, atoms: &AtomTable, flags: CodecFlags) -> Result<(), CodecError> {
    enc_atom(buf, pid.node, atoms, flags)?;
    if flags.extended_pids_ports {
        buf.push(NEW_PID_EXT);
        buf.extend_from_slice(&pid.id.to_be_bytes());
        buf.extend_from_slice(&pid.serial.to_be_bytes());
        buf.extend_from_slice(&pid.creation.to_be_bytes());
    } else {
        buf.push(PID_EXT);
        buf.extend_from_slice(&(pid.id & 0x7fff).to_be_bytes());
        buf.extend_from_slice(&(pid.serial & 0x1fff).to_be_bytes());
        buf.push((pid.creation & 0x03) as u8);
    }
    Ok(())
}

fn enc_port(buf: &mut Vec<u8>, port: &Port, atoms: &AtomTable, flags: CodecFlags) -> Result<(), CodecError> {
    enc_atom(buf, port.node, atoms, flags)?;
    if flags.extended_pids_ports {
        if port.id <= u32::MAX as u64 {
            buf.push(NEW_PORT_EXT);
            buf.extend_from_slice(&(port.id as u32).to_be_bytes());
        } else {
            buf.push(V4_PORT_EXT);
            buf.extend_from_slice(&port.id.to_be_bytes());
        }
        buf.extend_from_slice(&port.creation.to_be_bytes());
    } else {
        buf.push(PORT_EXT);
        buf.extend_from_slice(&((port.id as u32) & 0x0fff_ffff).to_be_bytes());
        buf.push((port.creation & 0x03) as u8);
    }
    Ok(())
}

fn enc_ref(
    buf: &mut Vec<u8>,
    reference: &Reference,
    atoms: &AtomTable,
    flags: CodecFlags,
) -> Result<(), CodecError> {
    enc_atom(buf, reference.node, atoms, flags)?;
    if flags.extended_references {
        buf.push(if flags.big_creation {
            NEWER_REFERENCE_EXT
        } else {
            NEW_REFERENCE_EXT
        });
        buf.extend_from_slice(&(reference.ids.len() as u16).to_be_bytes());
        if flags.big_creation {
            buf.extend_from_slice(&reference.creation.to_be_bytes());
        } else {
            buf.push((reference.creation & 0xff) as u8);
        }
        for word in &reference.ids {
            buf.extend_from_slice(&word.to_be_bytes());
        }
    } else {
        buf.push(REFERENCE_EXT);
        let first = reference.ids.first().copied().unwrap_or(0) & 0x0003_ffff;
        buf.extend_from_slice(&first.to_be_bytes());
        buf.push((reference.creation & 0x03) as u8);
    }
    Ok(())
}
