//! Distribution protocol capability flags exchanged during the handshake.
//!
//! Values match the bit positions Erlang's distribution protocol has used
//! since `dist.hrl`; this crate only needs the subset the handshake
//! negotiates plus `HANDSHAKE_23` to say the modern challenge layout is
//! understood.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DistFlags(u32);

impl DistFlags {
    pub const EXTENDED_REFERENCES: DistFlags = DistFlags(0x4);
    pub const DIST_MONITOR: DistFlags = DistFlags(0x8);
    pub const EXTENDED_PIDS_PORTS: DistFlags = DistFlags(0x100);
    pub const BIT_BINARIES: DistFlags = DistFlags(0x400);
    pub const NEW_FLOATS: DistFlags = DistFlags(0x800);
    pub const UTF8_ATOMS: DistFlags = DistFlags(0x10000);
    pub const MAP_TAG: DistFlags = DistFlags(0x20000);
    pub const BIG_CREATION: DistFlags = DistFlags(0x40000);
    pub const HANDSHAKE_23: DistFlags = DistFlags(0x1000000);

    pub const fn empty() -> Self {
        DistFlags(0)
    }

    /// The flag set this crate always advertises: every bit a conforming
    /// handshake must include.
    pub const fn required() -> Self {
        DistFlags(
            Self::EXTENDED_REFERENCES.0
                | Self::DIST_MONITOR.0
                | Self::EXTENDED_PIDS_PORTS.0
                | Self::BIT_BINARIES.0
                | Self::NEW_FLOATS.0
                | Self::UTF8_ATOMS.0
                | Self::MAP_TAG.0
                | Self::BIG_CREATION.0
                | Self::HANDSHAKE_23.0,
        )
    }

    pub const fn from_bits(bits: u32) -> Self {
        DistFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: DistFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: DistFlags) -> Self {
        DistFlags(self.0 | other.0)
    }

    /// `true` if `self` carries every bit [`required`](Self::required) sets.
    pub const fn satisfies_required(self) -> bool {
        self.contains(Self::required())
    }
}

impl std::ops::BitOr for DistFlags {
    type Output = DistFlags;
    fn bitor(self, rhs: DistFlags) -> DistFlags {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_set_satisfies_itself() {
        assert!(DistFlags::required().satisfies_required());
    }

    #[test]
    fn missing_a_required_bit_fails() {
        let almost = DistFlags::required().bits() & !DistFlags::HANDSHAKE_23.bits();
        assert!(!DistFlags::from_bits(almost).satisfies_required());
    }

    #[test]
    fn union_combines_bits() {
        let combo = DistFlags::EXTENDED_REFERENCES | DistFlags::NEW_FLOATS;
        assert!(combo.contains(DistFlags::EXTENDED_REFERENCES));
        assert!(combo.contains(DistFlags::NEW_FLOATS));
        assert!(!combo.contains(DistFlags::BIG_CREATION));
    }
}
