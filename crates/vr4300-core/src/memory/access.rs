//! Access width, byte order and alignment policy for data and fetch accesses.

use crate::memory::MemoryError;

/// Byte order used for every multi-byte access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endianness {
    /// Most significant byte at the lowest address.
    #[default]
    Big,
    /// Least significant byte at the lowest address.
    Little,
}

impl Endianness {
    /// Maps the loader's `little_endian` flag to a byte order.
    #[must_use]
    pub const fn from_little_endian_flag(little_endian: bool) -> Self {
        if little_endian {
            Self::Little
        } else {
            Self::Big
        }
    }

    /// Assembles `bytes` (at most eight) into a zero-extended value.
    #[must_use]
    pub fn assemble(self, bytes: &[u8]) -> u64 {
        let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
        match self {
            Self::Big => bytes.iter().fold(0, fold),
            Self::Little => bytes.iter().rev().fold(0, fold),
        }
    }

    /// Splits the low `out.len()` bytes of `value` into `out` in this byte order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn scatter(self, value: u64, out: &mut [u8]) {
        let len = out.len();
        for (index, slot) in out.iter_mut().enumerate() {
            let significance = match self {
                Self::Big => len - 1 - index,
                Self::Little => index,
            };
            *slot = (value >> (8 * significance)) as u8;
        }
    }
}

/// Architectural access widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessWidth {
    /// 8 bits.
    Byte,
    /// 16 bits.
    Half,
    /// 32 bits.
    Word,
    /// 64 bits.
    Double,
}

impl AccessWidth {
    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
            Self::Double => 8,
        }
    }

    /// Width in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Byte => 8,
            Self::Half => 16,
            Self::Word => 32,
            Self::Double => 64,
        }
    }

    /// Mask covering the low `bits()` bits.
    #[must_use]
    pub const fn mask(self) -> u64 {
        match self {
            Self::Double => u64::MAX,
            _ => (1 << self.bits()) - 1,
        }
    }
}

/// Validates natural alignment of `address` for `width`.
///
/// # Errors
///
/// Returns [`MemoryError::Unaligned`] when `address` is not a multiple of the
/// access width.
pub const fn validate_alignment(address: u64, width: AccessWidth) -> Result<(), MemoryError> {
    if address % width.bytes() == 0 {
        Ok(())
    } else {
        Err(MemoryError::Unaligned { address, width })
    }
}
