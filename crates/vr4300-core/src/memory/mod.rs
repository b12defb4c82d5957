//! Flat byte-addressable memory lent to the execution engine by the host.

/// Access width, byte order and alignment policy helpers.
pub mod access;

pub use access::{validate_alignment, AccessWidth, Endianness};

use core::ops::Range;

use thiserror::Error;

/// Default backing-store size for a freshly allocated memory (4 MiB).
pub const DEFAULT_MEMORY_BYTES: usize = 0x40_0000;

/// Failure of a single memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryError {
    /// Some byte of the access lies outside the backing store.
    #[error("{width:?} access at {address:#018x} is outside memory")]
    OutOfRange {
        /// First byte address.
        address: u64,
        /// Access width.
        width: AccessWidth,
    },
    /// Address is not naturally aligned for the width.
    #[error("{width:?} access at {address:#018x} is unaligned")]
    Unaligned {
        /// First byte address.
        address: u64,
        /// Access width.
        width: AccessWidth,
    },
}

impl MemoryError {
    /// Address of the failed access.
    #[must_use]
    pub const fn address(self) -> u64 {
        match self {
            Self::OutOfRange { address, .. } | Self::Unaligned { address, .. } => address,
        }
    }
}

/// Fixed-size memory mapped at `origin..origin + len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Box<[u8]>,
    origin: u64,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_BYTES)
    }
}

impl Memory {
    /// Allocates `len` zeroed bytes mapped at address 0.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self::from_bytes(vec![0; len])
    }

    /// Wraps an existing image mapped at address 0.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
            origin: 0,
        }
    }

    /// Remaps the same bytes so that byte 0 lives at `origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: u64) -> Self {
        self.origin = origin;
        self
    }

    /// Virtual address of the first byte.
    #[must_use]
    pub const fn origin(&self) -> u64 {
        self.origin
    }

    /// Size of the backing store in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the backing store is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw view of the backing store.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn span(&self, address: u64, width: AccessWidth) -> Result<Range<usize>, MemoryError> {
        let out_of_range = MemoryError::OutOfRange { address, width };
        let start = address
            .checked_sub(self.origin)
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or(out_of_range)?;
        let len = usize::try_from(width.bytes()).map_err(|_| out_of_range)?;
        let end = start.checked_add(len).ok_or(out_of_range)?;
        if end > self.bytes.len() {
            return Err(out_of_range);
        }
        Ok(start..end)
    }

    /// Reads a naturally aligned value, zero-extended to 64 bits.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Unaligned`] for a misaligned address and
    /// [`MemoryError::OutOfRange`] when any byte is unmapped.
    pub fn read(
        &self,
        address: u64,
        width: AccessWidth,
        endianness: Endianness,
    ) -> Result<u64, MemoryError> {
        validate_alignment(address, width)?;
        let span = self.span(address, width)?;
        Ok(endianness.assemble(&self.bytes[span]))
    }

    /// Writes the low bits of `value` as a naturally aligned access.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Unaligned`] for a misaligned address and
    /// [`MemoryError::OutOfRange`] when any byte is unmapped. Nothing is
    /// written on error.
    pub fn write(
        &mut self,
        address: u64,
        width: AccessWidth,
        value: u64,
        endianness: Endianness,
    ) -> Result<(), MemoryError> {
        validate_alignment(address, width)?;
        let span = self.span(address, width)?;
        endianness.scatter(value, &mut self.bytes[span]);
        Ok(())
    }

    /// Checks that an aligned access would succeed without performing it.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Memory::read`].
    pub fn probe(&self, address: u64, width: AccessWidth) -> Result<(), MemoryError> {
        validate_alignment(address, width)?;
        self.span(address, width).map(|_| ())
    }

    /// Reads a 32-bit instruction word.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Memory::read`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn fetch(&self, address: u64, endianness: Endianness) -> Result<u32, MemoryError> {
        self.read(address, AccessWidth::Word, endianness)
            .map(|word| word as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessWidth, Endianness, Memory, MemoryError, DEFAULT_MEMORY_BYTES};

    #[test]
    fn default_backing_store_is_zeroed() {
        let memory = Memory::default();
        assert_eq!(memory.len(), DEFAULT_MEMORY_BYTES);
        assert!(memory.as_bytes().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn big_and_little_endian_views_share_bytes() {
        let mut memory = Memory::new(16);
        memory
            .write(0, AccessWidth::Word, 0x0A0B_0C0D, Endianness::Big)
            .expect("in range");
        assert_eq!(&memory.as_bytes()[..4], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(
            memory.read(0, AccessWidth::Word, Endianness::Little),
            Ok(0x0D0C_0B0A)
        );
        assert_eq!(memory.read(2, AccessWidth::Half, Endianness::Big), Ok(0x0C0D));
        assert_eq!(memory.read(3, AccessWidth::Byte, Endianness::Big), Ok(0x0D));
    }

    #[test]
    fn doubleword_roundtrip_preserves_all_bits() {
        let mut memory = Memory::new(16);
        memory
            .write(8, AccessWidth::Double, 0x8000_0000_DEAD_BEEF, Endianness::Little)
            .expect("in range");
        assert_eq!(
            memory.read(8, AccessWidth::Double, Endianness::Little),
            Ok(0x8000_0000_DEAD_BEEF)
        );
    }

    #[test]
    fn out_of_range_access_is_reported_not_truncated() {
        let mut memory = Memory::new(8);
        assert_eq!(
            memory.read(8, AccessWidth::Byte, Endianness::Big),
            Err(MemoryError::OutOfRange {
                address: 8,
                width: AccessWidth::Byte,
            })
        );
        assert!(memory
            .write(u64::MAX - 3, AccessWidth::Word, 0, Endianness::Big)
            .is_err());
        assert!(memory.as_bytes().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn origin_shifts_the_mapped_window() {
        let mut memory = Memory::new(8).with_origin(0x8000_0000);
        memory
            .write(0x8000_0004, AccessWidth::Word, 0x1234_5678, Endianness::Big)
            .expect("mapped");
        assert_eq!(memory.fetch(0x8000_0004, Endianness::Big), Ok(0x1234_5678));
        assert_eq!(
            memory.read(0x7FFF_FFFC, AccessWidth::Word, Endianness::Big),
            Err(MemoryError::OutOfRange {
                address: 0x7FFF_FFFC,
                width: AccessWidth::Word,
            })
        );
    }

    #[test]
    fn misaligned_access_is_rejected_before_range_check() {
        let memory = Memory::new(8);
        assert_eq!(
            memory.read(0x11, AccessWidth::Word, Endianness::Big),
            Err(MemoryError::Unaligned {
                address: 0x11,
                width: AccessWidth::Word,
            })
        );
        assert_eq!(memory.probe(4, AccessWidth::Word), Ok(()));
    }
}
