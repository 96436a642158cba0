//! Opaque bitfields.

use std::fmt;

/// A status or error field whose bits are not fully understood.
///
/// Only the raw value is kept. Callers test individual bits; no meaning is
/// attached to bits that have not been confirmed against the device.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bitfield(pub u32);

impl Bitfield {
    /// Raw value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if bit `index` (0 = least significant) is set.
    #[must_use]
    pub const fn is_set(self, index: u8) -> bool {
        index < 32 && self.0 & (1 << index) != 0
    }

    /// Indices of all set bits, lowest first.
    pub fn set_bits(self) -> impl Iterator<Item = u8> {
        (0u8..32).filter(move |&index| self.is_set(index))
    }
}

impl From<u8> for Bitfield {
    fn from(value: u8) -> Self {
        Self(u32::from(value))
    }
}

impl From<u16> for Bitfield {
    fn from(value: u16) -> Self {
        Self(u32::from(value))
    }
}

impl From<u32> for Bitfield {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Bitfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitfield({:#010x})", self.0)
    }
}
