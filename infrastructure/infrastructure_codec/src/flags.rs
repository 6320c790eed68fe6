//! Wire-shape flags negotiated during the distribution handshake.
//!
//! Which byte layout the codec uses for pids, ports and references depends
//! on what the peer advertised in its handshake flag bitfield (see
//! `adapters_transport`). A fresh `CodecFlags::default()` reflects a modern
//! node that only speaks the extended forms.

/// Controls pid/port/ref wire shape and atom encoding. Threaded through
/// every encode/decode call rather than stored globally, since a node can
/// be talking to peers that negotiated different flags on different
/// connections at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecFlags {
    /// `DFLAG_EXTENDED_REFERENCES`: use `NEW_REFERENCE_EXT`/`NEWER_REFERENCE_EXT`
    /// instead of the single-word legacy `REFERENCE_EXT`.
    pub extended_references: bool,
    /// `DFLAG_EXTENDED_PIDS_PORTS`: use `NEW_PID_EXT`/`NEW_PORT_EXT` instead
    /// of the 15/13-bit-masked legacy forms.
    pub extended_pids_ports: bool,
    /// `DFLAG_NEW_FLOATS`: always set by this crate; `FLOAT_EXT`'s 31-byte
    /// ASCII form is never produced, only accepted on decode.
    pub new_floats: bool,
    /// `DFLAG_UTF8_ATOMS`: encode atoms as `ATOM_UTF8_EXT`/`SMALL_ATOM_UTF8_EXT`
    /// rather than the Latin-1 `ATOM_EXT`/`SMALL_ATOM_EXT`.
    pub utf8_atoms: bool,
    /// `DFLAG_BIG_CREATION`: 4-byte creation fields instead of 1 byte, for
    /// legacy pid/port and for choosing `NEWER_REFERENCE_EXT` over
    /// `NEW_REFERENCE_EXT`.
    pub big_creation: bool,
}

impl Default for CodecFlags {
    fn default() -> Self {
        CodecFlags {
            extended_references: true,
            extended_pids_ports: true,
            new_floats: true,
            utf8_atoms: true,
            big_creation: true,
        }
    }
}

impl CodecFlags {
    /// The flag set a pre-OTP-23 legacy peer negotiates: none of the
    /// extended forms, 1-byte creations.
    pub fn legacy() -> Self {
        CodecFlags {
            extended_references: false,
            extended_pids_ports: false,
            new_floats: true,
            utf8_atoms: false,
            big_creation: false,
        }
    }
}
